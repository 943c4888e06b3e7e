//! `ConnectionBuilder` for upstream connections

use std::sync::Arc;
use std::time::Duration;

use marvin_proxy::config::ConnectConfig;
use marvin_proxy::connect::{Connection, Connector, Scheme};
use marvin_proxy::dns::{HickoryResolver, Resolve};
use marvin_proxy::tls::TlsClientConfig;
use url::Url;

/// Builder for a single client-side connection.
///
/// Target parse errors are held until [`build`](Self::build) or
/// [`open`](Self::open), so the chain never breaks mid-way.
pub struct ConnectionBuilder {
    target: Result<(Scheme, String, u16), marvin_proxy::Error>,
    config: ConnectConfig,
    resolver: Option<Arc<dyn Resolve>>,
    tls: Option<TlsClientConfig>,
}

impl ConnectionBuilder {
    #[must_use]
    pub fn new(target: &str) -> Self {
        Self {
            target: parse_target(target),
            config: ConnectConfig::default(),
            resolver: None,
            tls: None,
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_connect_timeout(Some(timeout));
        self
    }

    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_handshake_timeout(Some(timeout));
        self
    }

    /// Bound every read and every complete write.
    #[must_use]
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_io_timeout(Some(timeout));
        self
    }

    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config = self.config.with_tcp_nodelay(enabled);
        self
    }

    #[must_use]
    pub fn keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.config = self.config.with_tcp_keepalive(keepalive);
        self
    }

    #[must_use]
    pub fn config(mut self, config: ConnectConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolve) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Resolve through hickory-dns instead of the system resolver.
    #[must_use]
    pub fn hickory(self) -> Self {
        self.resolver(HickoryResolver::new())
    }

    #[must_use]
    pub fn tls(mut self, tls: TlsClientConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Trust an additional PEM root for this connection.
    #[must_use]
    pub fn root_certificate(mut self, pem: impl Into<String>) -> Self {
        self.tls = Some(self.tls.take().unwrap_or_default().with_root_cert(pem));
        self
    }

    /// Unconnected connection; call `connect()` on it to open.
    ///
    /// # Errors
    ///
    /// Returns a `Config`-kind error for an invalid target, invalid settings
    /// or unusable TLS roots.
    pub fn build(self) -> marvin_proxy::Result<Box<dyn Connection>> {
        use marvin_proxy::config::Validator;

        let (scheme, host, port) = self.target?;
        self.config.validate()?;

        let mut connector = Connector::new(self.config);
        if let Some(resolver) = self.resolver {
            connector = connector.with_resolver(resolver);
        }
        if let Some(tls) = &self.tls {
            connector = connector.with_tls(tls)?;
        }
        connector.connection(scheme, &host, port)
    }

    /// Build and connect.
    ///
    /// # Errors
    ///
    /// Returns the build error or the `Resolve`, `Connect` or `Handshake`
    /// error of the attempt.
    pub async fn open(self) -> marvin_proxy::Result<Box<dyn Connection>> {
        let mut connection = self.build()?;
        connection.connect().await?;
        Ok(connection)
    }
}

impl std::fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("target", &self.target.as_ref().ok())
            .field("config", &self.config)
            .finish()
    }
}

fn parse_target(target: &str) -> Result<(Scheme, String, u16), marvin_proxy::Error> {
    let url = Url::parse(target)
        .map_err(|e| marvin_proxy::error::config(format!("invalid target '{target}': {e}")))?;
    let scheme: Scheme = url.scheme().parse()?;
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| marvin_proxy::error::config(format!("target '{target}' has no host")))?;
    let port = url.port().unwrap_or_else(|| scheme.default_port());
    Ok((scheme, host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_defaults_port_by_scheme() {
        let (scheme, host, port) = parse_target("https://example.com").unwrap();
        assert_eq!(scheme, Scheme::Https);
        assert_eq!(host, "example.com");
        assert_eq!(port, 443);

        let (scheme, _, port) = parse_target("http://example.com:8080/path").unwrap();
        assert_eq!(scheme, Scheme::Http);
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_parse_target_ipv6() {
        let (_, host, port) = parse_target("http://[::1]:9991").unwrap();
        assert_eq!(host, "[::1]");
        assert_eq!(port, 9991);
    }

    #[test]
    fn test_parse_target_rejects_bad_input() {
        assert!(parse_target("not a url").unwrap_err().is_config());
        assert!(parse_target("ftp://example.com").unwrap_err().is_config());
    }
}
