//! Factory for upstream connections

use std::sync::{Arc, OnceLock};

use rustls::ClientConfig;

use super::connection::{Connection, Scheme};
use super::tcp::TcpConnection;
use super::tls::TlsConnection;
use crate::config::ConnectConfig;
use crate::dns::{GaiResolver, Resolve};
use crate::tls::TlsClientConfig;

/// Builds client-side connections that share a resolver, socket settings and
/// TLS roots. Cheap to clone.
#[derive(Clone)]
pub struct Connector {
    resolver: Arc<dyn Resolve>,
    config: ConnectConfig,
    tls: Option<Arc<ClientConfig>>,
    default_tls: Arc<OnceLock<Arc<ClientConfig>>>,
}

impl Connector {
    /// Connector using the system resolver. Without an explicit TLS client
    /// configuration, the default one is built on first use of the `https`
    /// scheme and shared by every clone afterwards.
    #[must_use]
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            resolver: Arc::new(GaiResolver::new()),
            config,
            tls: None,
            default_tls: Arc::new(OnceLock::new()),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    /// # Errors
    ///
    /// Returns a `Config`-kind error when the root store cannot be built.
    pub fn with_tls(self, tls: &TlsClientConfig) -> crate::Result<Self> {
        Ok(self.with_tls_config(tls.build()?))
    }

    #[must_use]
    pub fn with_tls_config(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn Resolve> {
        &self.resolver
    }

    /// TLS client configuration used for `https` connections.
    ///
    /// # Errors
    ///
    /// Returns a `Config`-kind error when the default root store cannot be
    /// built.
    pub fn client_tls(&self) -> crate::Result<Arc<ClientConfig>> {
        if let Some(tls) = &self.tls {
            return Ok(tls.clone());
        }
        if let Some(tls) = self.default_tls.get() {
            return Ok(tls.clone());
        }
        // racing first builds keep whichever lands first
        let built = TlsClientConfig::default().build()?;
        Ok(self.default_tls.get_or_init(|| built).clone())
    }

    /// Unconnected connection for `scheme://host:port`.
    ///
    /// # Errors
    ///
    /// Returns a `Config`-kind error when `https` is requested and no TLS
    /// client configuration can be built.
    pub fn connection(
        &self,
        scheme: Scheme,
        host: &str,
        port: u16,
    ) -> crate::Result<Box<dyn Connection>> {
        match scheme {
            Scheme::Http => Ok(Box::new(TcpConnection::new(
                host,
                port,
                self.resolver.clone(),
                self.config.clone(),
            ))),
            Scheme::Https => {
                let tls = self.client_tls()?;
                Ok(Box::new(TlsConnection::new(
                    host,
                    port,
                    self.resolver.clone(),
                    self.config.clone(),
                    tls,
                )))
            }
        }
    }

    /// Opens a connection to `scheme://host:port`.
    ///
    /// # Errors
    ///
    /// Returns the `Resolve`, `Connect` or `Handshake` error of the attempt.
    pub async fn connect(
        &self,
        scheme: Scheme,
        host: &str,
        port: u16,
    ) -> crate::Result<Box<dyn Connection>> {
        let mut connection = self.connection(scheme, host, port)?;
        connection.connect().await?;
        Ok(connection)
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new(ConnectConfig::default())
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .field("tls", &self.tls.is_some())
            .field("default_tls", &self.default_tls.get().is_some())
            .finish()
    }
}
