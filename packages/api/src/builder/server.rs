//! `ServerBuilder` and its handler type state
//!
//! The handler factory is the only mandatory piece, so the builder tracks it
//! in its type: `listen` and `serve` exist only once `handler` was called.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use marvin_proxy::collector::Collector;
use marvin_proxy::config::{ConnectConfig, OverloadPolicy, ServerConfig};
use marvin_proxy::connect::Connector;
use marvin_proxy::dns::Resolve;
use marvin_proxy::handler::HandlerFactory;
use marvin_proxy::server::{Heartbeat, Server};
use marvin_proxy::tls::{TlsClientConfig, TlsServerConfig};
use tokio::net::TcpListener;

/// State marker: no handler factory yet
#[derive(Debug, Clone, Copy)]
pub struct HandlerNotSet;

/// State marker holding the handler factory
#[derive(Debug, Clone)]
pub struct HandlerSet<F>(F);

/// Builder for a proxy [`Server`].
pub struct ServerBuilder<S = HandlerNotSet> {
    config: ServerConfig,
    collector: Option<Arc<dyn Collector>>,
    heartbeat: Option<Arc<dyn Heartbeat>>,
    tls: Option<TlsServerConfig>,
    upstream_tls: Option<TlsClientConfig>,
    resolver: Option<Arc<dyn Resolve>>,
    signal_handling: bool,
    state: S,
}

impl ServerBuilder<HandlerNotSet> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            collector: None,
            heartbeat: None,
            tls: None,
            upstream_tls: None,
            resolver: None,
            signal_handling: true,
            state: HandlerNotSet,
        }
    }

    /// Set the factory creating one request handler per accepted connection.
    ///
    /// # Example
    /// ```no_run
    /// use marvin::{Connection, Marvin, RequestHandler};
    /// # fn handler() -> Box<dyn RequestHandler> { unimplemented!() }
    ///
    /// let builder = Marvin::server().port(8080).handler(|_: &dyn Connection| handler());
    /// ```
    #[must_use]
    pub fn handler<F: HandlerFactory>(self, factory: F) -> ServerBuilder<HandlerSet<F>> {
        ServerBuilder {
            config: self.config,
            collector: self.collector,
            heartbeat: self.heartbeat,
            tls: self.tls,
            upstream_tls: self.upstream_tls,
            resolver: self.resolver,
            signal_handling: self.signal_handling,
            state: HandlerSet(factory),
        }
    }
}

impl Default for ServerBuilder<HandlerNotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ServerBuilder<S> {
    #[must_use]
    pub fn bind(mut self, address: IpAddr) -> Self {
        self.config = self.config.with_bind_address(address);
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config = self.config.with_port(port);
        self
    }

    /// Connection ceiling; further clients are rejected or deferred.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config = self.config.with_max_connections(max);
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config = self.config.with_worker_threads(threads);
        self
    }

    #[must_use]
    pub fn heartbeat_interval_ms(mut self, millis: u64) -> Self {
        self.config = self.config.with_heartbeat_interval_ms(millis);
        self
    }

    /// Stop accepting while full instead of dropping new clients.
    #[must_use]
    pub fn defer_when_full(mut self) -> Self {
        self.config = self.config.with_overload_policy(OverloadPolicy::Defer);
        self
    }

    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config = self.config.with_shutdown_grace(grace);
        self
    }

    #[must_use]
    pub fn connect_config(mut self, connect: ConnectConfig) -> Self {
        self.config = self.config.with_connect_config(connect);
        self
    }

    #[must_use]
    pub fn collector(mut self, collector: impl Collector) -> Self {
        self.collector = Some(Arc::new(collector));
        self
    }

    #[must_use]
    pub fn heartbeat(mut self, heartbeat: impl Heartbeat) -> Self {
        self.heartbeat = Some(Arc::new(heartbeat));
        self
    }

    /// Terminate TLS on accepted connections.
    #[must_use]
    pub fn tls(mut self, tls: TlsServerConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Roots used by handlers opening `https` upstream connections.
    #[must_use]
    pub fn upstream_tls(mut self, tls: TlsClientConfig) -> Self {
        self.upstream_tls = Some(tls);
        self
    }

    /// Resolver used by handlers opening upstream connections.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolve) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Whether Ctrl-C and SIGTERM shut the server down. On by default.
    #[must_use]
    pub fn signal_handling(mut self, enabled: bool) -> Self {
        self.signal_handling = enabled;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl<F: HandlerFactory> ServerBuilder<HandlerSet<F>> {
    /// Validate the configuration and assemble the server.
    ///
    /// # Errors
    ///
    /// Returns a `Config`-kind error for invalid settings or unusable
    /// upstream TLS roots.
    pub fn build(self) -> marvin_proxy::Result<Server> {
        let mut connector = Connector::new(self.config.connect.clone());
        if let Some(resolver) = self.resolver {
            connector = connector.with_resolver(resolver);
        }
        if let Some(tls) = &self.upstream_tls {
            connector = connector.with_tls(tls)?;
        }

        let mut server = Server::new(self.config, self.state.0)?
            .with_connector(connector)
            .with_signal_handling(self.signal_handling);
        if let Some(collector) = self.collector {
            server = server.with_collector(collector);
        }
        if let Some(heartbeat) = self.heartbeat {
            server = server.with_heartbeat(heartbeat);
        }
        if let Some(tls) = self.tls {
            server = server.with_tls(tls);
        }

        tracing::debug!(config = ?server.config(), "server built");
        Ok(server)
    }

    /// Build, bind and serve on a dedicated runtime until shutdown.
    ///
    /// # Errors
    ///
    /// See [`Server::listen`].
    pub fn listen(self) -> marvin_proxy::Result<()> {
        self.build()?.listen()
    }

    /// Build and serve on an existing listener, on the current runtime.
    ///
    /// # Errors
    ///
    /// See [`Server::serve`].
    pub async fn serve(self, listener: TcpListener) -> marvin_proxy::Result<()> {
        self.build()?.serve(listener).await
    }
}

impl<S> std::fmt::Debug for ServerBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("tls", &self.tls.is_some())
            .field("signal_handling", &self.signal_handling)
            .finish()
    }
}
