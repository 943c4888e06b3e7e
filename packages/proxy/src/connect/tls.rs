//! TLS connection over rustls
//!
//! Client-side connections resolve, connect and then run the client handshake;
//! server-side connections wrap an accepted socket and run the server
//! handshake. Either way the handshake happens inside `connect()` and a
//! failure surfaces as a `Handshake`-kind error.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};

use super::connection::{Connection, ConnectionId, ConnectionProbe, ConnectionState, RawFd, Scheme};
use super::io::{Core, cancellable, deadline, read_into, shutdown, write_chain};
use crate::buffer::{BufferChain, Segment};
use crate::config::ConnectConfig;
use crate::dns::Resolve;
use crate::error::{self, NotOpen};
use crate::tls::client::server_name;

enum Role {
    Client {
        connector: TlsConnector,
        resolver: Arc<dyn Resolve>,
    },
    Server {
        acceptor: TlsAcceptor,
        pending: Option<TcpStream>,
    },
}

/// Encrypted connection; handshake completes before the state becomes `Open`.
pub struct TlsConnection {
    core: Core,
    role: Role,
    stream: Option<TlsStream<TcpStream>>,
}

impl TlsConnection {
    /// Client-side connection to `host:port`, verified against `tls`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        resolver: Arc<dyn Resolve>,
        config: ConnectConfig,
        tls: Arc<ClientConfig>,
    ) -> Self {
        Self {
            core: Core::new(Scheme::Https, host.into(), port, config, ConnectionState::Unconnected),
            role: Role::Client {
                connector: TlsConnector::from(tls),
                resolver,
            },
            stream: None,
        }
    }

    /// Server-side connection around an accepted socket. The handshake runs on
    /// `connect()`.
    pub fn accepted(
        stream: TcpStream,
        peer: SocketAddr,
        config: ConnectConfig,
        acceptor: TlsAcceptor,
    ) -> Self {
        let core = Core::accepted(
            Scheme::Https,
            &stream,
            peer,
            config,
            ConnectionState::Unconnected,
        );
        tracing::debug!(id = %core.id, peer = %peer, fd = ?core.fd, "accepted tls connection");
        Self {
            core,
            role: Role::Server {
                acceptor,
                pending: Some(stream),
            },
            stream: None,
        }
    }

    /// Negotiated ALPN protocol, once open.
    #[must_use]
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        match self.stream.as_ref()? {
            TlsStream::Client(s) => s.get_ref().1.alpn_protocol(),
            TlsStream::Server(s) => s.get_ref().1.alpn_protocol(),
        }
    }

    async fn establish(&mut self) -> crate::Result<TlsStream<TcpStream>> {
        let limit = self.core.config.handshake_timeout;
        match &mut self.role {
            Role::Client {
                connector,
                resolver,
            } => {
                let connector = connector.clone();
                let resolver = resolver.clone();
                let name = server_name(&self.core.host)
                    .map_err(|e| crate::Error::from(e).with_target(&self.core.host, self.core.port))?;
                let tcp = self.core.open_socket(&resolver).await?;
                let tls = deadline(limit, connector.connect(name, tcp))
                    .await
                    .map_err(|e| self.core.fail(error::handshake, e))?;
                Ok(TlsStream::from(tls))
            }
            Role::Server { acceptor, pending } => {
                let Some(tcp) = pending.take() else {
                    return Err(self.core.fail(error::programming, NotOpen("handshake, no socket")));
                };
                let acceptor = acceptor.clone();
                self.core.probe.advance(ConnectionState::Connecting);
                let tls = deadline(limit, acceptor.accept(tcp))
                    .await
                    .map_err(|e| self.core.fail(error::handshake, e))?;
                if let Some(sni) = tls.get_ref().1.server_name() {
                    self.core.host = sni.to_string();
                }
                Ok(TlsStream::from(tls))
            }
        }
    }

    fn stream_mut(&mut self, op: &'static str) -> crate::Result<&mut TlsStream<TcpStream>> {
        self.core.check_open(op)?;
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(self.core.fail(error::programming, NotOpen(op))),
        }
    }
}

impl Connection for TlsConnection {
    fn connect(&mut self) -> BoxFuture<'_, crate::Result<()>> {
        Box::pin(async move {
            self.core.check_connectable()?;
            let token = self.core.token();
            let result = cancellable(&token, self.establish()).await;
            match result {
                Ok(stream) => {
                    self.stream = Some(stream);
                    tracing::debug!(id = %self.core.id, host = %self.core.host, "tls handshake complete");
                    self.core.mark_open();
                    Ok(())
                }
                Err(e) => {
                    tracing::debug!(id = %self.core.id, error = %e, "tls connect failed");
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

    /// Sends `close_notify` after flushing.
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
        if let Role::Server { pending, .. } = &mut self.role {
            drop(pending.take());
        }
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

impl std::fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnection")
            .field("id", &self.core.id)
            .field("host", &self.core.host)
            .field("port", &self.core.port)
            .field("server_side", &matches!(self.role, Role::Server { .. }))
            .field("state", &self.core.probe.state())
            .finish()
    }
}
