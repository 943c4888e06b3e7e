//! Plain TCP connection

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::net::TcpStream;

use super::connection::{Connection, ConnectionId, ConnectionProbe, ConnectionState, RawFd, Scheme};
use super::io::{Core, cancellable, deadline, read_into, shutdown, write_chain};
use crate::buffer::{BufferChain, Segment};
use crate::config::ConnectConfig;
use crate::dns::Resolve;
use crate::error::{self, NotOpen};

/// Unencrypted connection over a tokio `TcpStream`.
pub struct TcpConnection {
    core: Core,
    resolver: Option<Arc<dyn Resolve>>,
    stream: Option<TcpStream>,
}

impl TcpConnection {
    /// Client-side connection to `host:port`; nothing happens until `connect()`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        resolver: Arc<dyn Resolve>,
        config: ConnectConfig,
    ) -> Self {
        Self {
            core: Core::new(Scheme::Http, host.into(), port, config, ConnectionState::Unconnected),
            resolver: Some(resolver),
            stream: None,
        }
    }

    /// Server-side connection around a socket returned by `accept`. Already open.
    pub fn accepted(stream: TcpStream, peer: SocketAddr, config: ConnectConfig) -> Self {
        let core = Core::accepted(Scheme::Http, &stream, peer, config, ConnectionState::Open);
        tracing::debug!(id = %core.id, peer = %peer, fd = ?core.fd, "accepted plain connection");
        Self {
            core,
            resolver: None,
            stream: Some(stream),
        }
    }

    fn stream_mut(&mut self, op: &'static str) -> crate::Result<&mut TcpStream> {
        self.core.check_open(op)?;
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(self.core.fail(error::programming, NotOpen(op))),
        }
    }
}

impl Connection for TcpConnection {
    fn connect(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        Box::pin(async move {
            self.core.check_connectable()?;
            let Some(resolver) = self.resolver.clone() else {
                return Err(self.core.fail(error::programming, NotOpen("connect, no resolver")));
            };

            let token = self.core.token();
            let result = cancellable(&token, self.core.open_socket(&resolver)).await;
            match result {
                Ok(stream) => {
                    self.stream = Some(stream);
                    self.core.mark_open();
                    Ok(())
                }
                Err(e) => {
                    tracing::debug!(id = %self.core.id, error = %e, "connect failed");
                    self.close();
                    Err(e)
                }
            }
        })
    }

    fn read<'a>(&'a mut self, segment: &'a mut Segment) -> BoxFuture<'a, crate::Result<usize>> {
        Box::pin(async move {
            let token = self.core.token();
            let limit = self.core.config.io_timeout;
            let (host, port) = (self.core.host.clone(), self.core.port);
            let stream = self.stream_mut("read")?;
            cancellable(&token, async {
                deadline(limit, read_into(stream, segment))
                    .await
                    .map_err(|e| error::transport(e).with_target(&host, port))
            })
            .await
        })
    }

    fn write<'a>(&'a mut self, chain: &'a BufferChain) -> BoxFuture<'a, crate::Result<usize>> {
        Box::pin(async move {
            let token = self.core.token();
            let limit = self.core.config.io_timeout;
            let (host, port) = (self.core.host.clone(), self.core.port);
            let stream = self.stream_mut("write")?;
            cancellable(&token, async {
                deadline(limit, write_chain(stream, chain))
                    .await
                    .map_err(|e| error::transport(e).with_target(&host, port))
            })
            .await
        })
    }

    fn drain(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        Box::pin(async move {
            let token = self.core.token();
            let limit = self.core.config.io_timeout;
            let stream = self.stream_mut("drain")?;
            cancellable(&token, async {
                deadline(limit, shutdown(stream)).await.map_err(error::transport)
            })
            .await
        })
    }

    fn close(&mut self) {
        self.core.release(&mut self.stream);
    }

    fn native_socket_fd(&self) -> Option<RawFd> {
        self.core.fd
    }

    fn state(&self) -> ConnectionState {
        self.core.probe.state()
    }

    fn scheme(&self) -> Scheme {
        self.core.scheme
    }

    fn host(&self) -> &str {
        &self.core.host
    }

    fn port(&self) -> u16 {
        self.core.port
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.core.peer
    }

    fn id(&self) -> ConnectionId {
        self.core.id
    }

    fn probe(&self) -> ConnectionProbe {
        self.core.probe.clone()
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("id", &self.core.id)
            .field("host", &self.core.host)
            .field("port", &self.core.port)
            .field("state", &self.core.probe.state())
            .finish()
    }
}
