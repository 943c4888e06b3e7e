//! State and I/O plumbing shared by the plain and encrypted variants

use std::error::Error as StdError;
use std::future::Future;
use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::candidates::connect_candidates;
use super::connection::{ConnectionId, ConnectionProbe, ConnectionState, RawFd, Scheme};
use super::socket_config::{configure_or_warn, raw_fd};
use crate::buffer::{BufferChain, DEFAULT_SEGMENT_CAPACITY, Segment};
use crate::config::ConnectConfig;
use crate::dns::{Name, Resolve};
use crate::error::{self, BoxError, ConnectionClosed, NotOpen, TimedOut};

pub(crate) struct Core {
    pub(crate) id: ConnectionId,
    pub(crate) scheme: Scheme,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) config: ConnectConfig,
    pub(crate) probe: ConnectionProbe,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) fd: Option<RawFd>,
}

impl Core {
    pub(crate) fn new(
        scheme: Scheme,
        host: String,
        port: u16,
        config: ConnectConfig,
        initial: ConnectionState,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            scheme,
            host,
            port,
            config,
            probe: ConnectionProbe::new(initial),
            peer: None,
            fd: None,
        }
    }

    /// Core for a socket handed over by the listener.
    pub(crate) fn accepted(
        scheme: Scheme,
        stream: &TcpStream,
        peer: SocketAddr,
        config: ConnectConfig,
        initial: ConnectionState,
    ) -> Self {
        configure_or_warn(stream, &config);
        let mut core = Self::new(scheme, peer.ip().to_string(), peer.port(), config, initial);
        core.attach(stream);
        core.peer = Some(peer);
        core
    }

    pub(crate) fn attach(&mut self, stream: &TcpStream) {
        self.peer = stream.peer_addr().ok();
        self.fd = raw_fd(stream);
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.probe.token().clone()
    }

    pub(crate) fn fail<E: Into<BoxError>>(&self, make: fn(E) -> crate::Error, e: E) -> crate::Error {
        make(e).with_target(&self.host, self.port)
    }

    /// Gate for read, write and drain.
    pub(crate) fn check_open(&self, op: &'static str) -> crate::Result<()> {
        if self.probe.is_canceled() {
            return Err(error::canceled().with_target(&self.host, self.port));
        }
        match self.probe.state() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => {
                Err(error::canceled().with_target(&self.host, self.port))
            }
            _ => Err(self.fail(error::programming, NotOpen(op))),
        }
    }

    /// Gate for connect: it may be triggered once, from `Unconnected`.
    pub(crate) fn check_connectable(&self) -> crate::Result<()> {
        if self.probe.is_canceled() {
            return Err(error::canceled().with_target(&self.host, self.port));
        }
        match self.probe.state() {
            ConnectionState::Unconnected => Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => {
                Err(error::canceled().with_target(&self.host, self.port))
            }
            _ => Err(self.fail(error::programming, NotOpen("connect, already started"))),
        }
    }

    /// Resolves the target and connects to the first reachable candidate.
    pub(crate) async fn open_socket(&mut self, resolver: &Arc<dyn Resolve>) -> crate::Result<TcpStream> {
        self.probe.advance(ConnectionState::Resolving);
        let candidates = resolver
            .resolve(Name::from(self.host.as_str()), self.port)
            .await
            .map_err(|e| e.with_target(&self.host, self.port))?;
        if candidates.is_empty() {
            return Err(error::no_candidates().with_target(&self.host, self.port));
        }
        tracing::debug!(
            id = %self.id,
            host = %self.host,
            port = self.port,
            candidates = candidates.len(),
            "resolved"
        );

        self.probe.advance(ConnectionState::Connecting);
        let connect_timeout = self.config.connect_timeout;
        let stream = connect_candidates(&candidates, |addr| connect_socket(addr, connect_timeout))
            .await
            .map_err(|e| e.with_target(&self.host, self.port))?;

        configure_or_warn(&stream, &self.config);
        self.attach(&stream);
        Ok(stream)
    }

    pub(crate) fn mark_open(&self) {
        self.probe.advance(ConnectionState::Open);
        tracing::debug!(
            id = %self.id,
            scheme = %self.scheme,
            host = %self.host,
            port = self.port,
            fd = ?self.fd,
            peer = ?self.peer,
            "connection open"
        );
    }

    /// Cancels, releases `stream` and marks the connection closed.
    pub(crate) fn release<S>(&mut self, stream: &mut Option<S>) {
        if self.probe.is_closed() {
            return;
        }
        self.probe.advance(ConnectionState::Closing);
        self.probe.cancel();
        drop(stream.take());
        self.fd = None;
        self.probe.advance(ConnectionState::Closed);
        tracing::debug!(id = %self.id, host = %self.host, port = self.port, "connection closed");
    }
}

async fn connect_socket(addr: SocketAddr, limit: Option<Duration>) -> Result<TcpStream, BoxError> {
    deadline(limit, TcpStream::connect(addr)).await
}

/// Runs `fut` unless `token` trips first, in which case the result is `Canceled`.
pub(crate) async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> crate::Result<T>
where
    F: Future<Output = crate::Result<T>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(error::canceled()),
        result = fut => result,
    }
}

/// Bounds `fut` by `limit`; an elapsed limit yields a [`TimedOut`] error.
pub(crate) async fn deadline<T, E, F>(limit: Option<Duration>, fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Box::new(TimedOut)),
        },
        None => fut.await.map_err(Into::into),
    }
}

/// One read into the spare capacity of `segment`, growing it when full.
pub(crate) async fn read_into<S>(stream: &mut S, segment: &mut Segment) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    if segment.spare_capacity() == 0 {
        segment.reserve(DEFAULT_SEGMENT_CAPACITY);
    }
    stream.read_buf(segment.buf_mut()).await
}

/// Writes every byte of `chain` with vectored writes, then flushes.
pub(crate) async fn write_chain<S>(stream: &mut S, chain: &BufferChain) -> io::Result<usize>
where
    S: AsyncWrite + Unpin,
{
    let mut slices = chain.to_vectored_view();
    let mut remaining: &mut [IoSlice<'_>] = &mut slices;
    let mut written = 0;

    while !remaining.is_empty() {
        let n = stream.write_vectored(remaining).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, ConnectionClosed));
        }
        written += n;
        IoSlice::advance_slices(&mut remaining, n);
    }

    stream.flush().await?;
    Ok(written)
}

/// Flushes and shuts down the write side.
pub(crate) async fn shutdown<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.flush().await?;
    stream.shutdown().await
}
