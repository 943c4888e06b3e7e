//! Connection capability trait and shared connection state

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::buffer::{BufferChain, Segment};

#[cfg(unix)]
pub use std::os::fd::RawFd;
/// Placeholder descriptor type where raw descriptors are not exposed.
#[cfg(not(unix))]
pub type RawFd = i64;

/// URL scheme served by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    #[must_use]
    pub fn is_encrypted(self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Scheme::Https)
        } else {
            Err(crate::error::config(format!("unsupported scheme '{s}'")))
        }
    }
}

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Unconnected = 0,
    Resolving = 1,
    Connecting = 2,
    Open = 3,
    Closing = 4,
    Closed = 5,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Unconnected,
            1 => ConnectionState::Resolving,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Open,
            4 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Process-unique connection identity, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Cheap, clonable view of a connection's state and cancellation.
///
/// Holding a probe does not keep the socket alive. Cancelling it aborts the
/// in-flight operation of the owning connection, which then completes with a
/// `Canceled` error.
#[derive(Clone)]
pub struct ConnectionProbe {
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
}

impl ConnectionProbe {
    pub(crate) fn new(initial: ConnectionState) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(initial as u8)),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves the state forward; never moves it back.
    pub(crate) fn advance(&self, next: ConnectionState) {
        self.state.fetch_max(next as u8, Ordering::AcqRel);
    }

    /// Trips the cancellation token of the owning connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for ConnectionProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProbe")
            .field("state", &self.state())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Asynchronous byte-stream connection, plain or encrypted.
///
/// Every I/O operation takes `&mut self`, so at most one operation is in
/// flight per connection. Each returned future completes exactly once. Once
/// [`close`](Connection::close) has run, every operation fails with a
/// `Canceled` error.
pub trait Connection: Send {
    /// Resolves the target, walks the candidates in order and, for the
    /// encrypted variant, performs the handshake. Server-side connections
    /// run only the handshake step.
    fn connect(&mut self) -> BoxFuture<'_, crate::Result<()>>;

    /// Performs one read into the spare capacity of `segment`.
    ///
    /// Returns the number of bytes read; `0` signals an orderly end of stream.
    fn read<'a>(&'a mut self, segment: &'a mut Segment) -> BoxFuture<'a, crate::Result<usize>>;

    /// Writes the whole chain, retrying partial writes internally.
    fn write<'a>(&'a mut self, chain: &'a BufferChain) -> BoxFuture<'a, crate::Result<usize>>;

    /// Flushes outstanding data and shuts down the write side.
    fn drain(&mut self) -> BoxFuture<'_, crate::Result<()>>;

    /// Cancels any in-flight operation and releases the socket. Idempotent.
    fn close(&mut self);

    /// Raw socket descriptor, for diagnostics only.
    fn native_socket_fd(&self) -> Option<RawFd>;

    fn state(&self) -> ConnectionState;

    fn scheme(&self) -> Scheme;

    fn host(&self) -> &str;

    fn port(&self) -> u16;

    fn peer_addr(&self) -> Option<SocketAddr>;

    fn id(&self) -> ConnectionId;

    fn probe(&self) -> ConnectionProbe;
}

impl fmt::Debug for dyn Connection + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("scheme", &self.scheme())
            .field("host", &self.host())
            .field("port", &self.port())
            .field("state", &self.state())
            .finish()
    }
}
