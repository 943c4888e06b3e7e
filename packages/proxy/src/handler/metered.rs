use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::buffer::{BufferChain, Segment};
use crate::connect::{Connection, ConnectionId, ConnectionProbe, ConnectionState, RawFd, Scheme};
use crate::telemetry::ServerStats;

/// Connection wrapper that counts transferred bytes into [`ServerStats`].
pub struct MeteredConnection {
    inner: Box<dyn Connection>,
    stats: Arc<ServerStats>,
}

impl MeteredConnection {
    #[must_use]
    pub fn new(inner: Box<dyn Connection>, stats: Arc<ServerStats>) -> Self {
        Self { inner, stats }
    }

    #[must_use]
    pub fn into_inner(self) -> Box<dyn Connection> {
        self.inner
    }
}

impl Connection for MeteredConnection {
    fn connect(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        self.inner.connect()
    }

    fn read<'a>(&'a mut self, segment: &'a mut Segment) -> BoxFuture<'a, crate::Result<usize>> {
        let stats = &self.stats;
        let read = self.inner.read(segment);
        Box::pin(async move {
            let n = read.await?;
            stats.record_read(n);
            Ok(n)
        })
    }

    fn write<'a>(&'a mut self, chain: &'a BufferChain) -> BoxFuture<'a, crate::Result<usize>> {
        let stats = &self.stats;
        let write = self.inner.write(chain);
        Box::pin(async move {
            let n = write.await?;
            stats.record_written(n);
            Ok(n)
        })
    }

    fn drain(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        self.inner.drain()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn native_socket_fd(&self) -> Option<RawFd> {
        self.inner.native_socket_fd()
    }

    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    fn scheme(&self) -> Scheme {
        self.inner.scheme()
    }

    fn host(&self) -> &str {
        self.inner.host()
    }

    fn port(&self) -> u16 {
        self.inner.port()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr()
    }

    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn probe(&self) -> ConnectionProbe {
        self.inner.probe()
    }
}
