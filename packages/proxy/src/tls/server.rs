//! Server-side TLS for accepted connections

use std::sync::Arc;

use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use super::client::parse_certificates;
use super::errors::TlsError;

/// TLS termination settings for the listener.
#[derive(Clone)]
pub struct TlsServerConfig {
    config: Arc<ServerConfig>,
}

impl TlsServerConfig {
    /// Wrap a fully built rustls server configuration, e.g. one whose
    /// certificate resolver performs interception.
    #[must_use]
    pub fn from_config(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Serve a single certificate chain and private key, both PEM encoded.
    ///
    /// # Errors
    ///
    /// Returns `TlsError` if the PEM data is malformed or rustls rejects the pair.
    pub fn from_pem(cert_chain_pem: &str, key_pem: &str) -> Result<Self, TlsError> {
        let certs = parse_certificates(cert_chain_pem)?;
        let key = rustls_pemfile::private_key(&mut key_pem.as_bytes())
            .map_err(|e| TlsError::KeyParsing(e.to_string()))?
            .ok_or_else(|| TlsError::KeyParsing("no private key found in PEM data".to_string()))?;

        let config = ServerConfig::builder_with_provider(super::provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(Self::from_config(Arc::new(config)))
    }

    #[must_use]
    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.config.clone())
    }
}

impl std::fmt::Debug for TlsServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsServerConfig")
            .field("alpn_protocols", &self.config.alpn_protocols.len())
            .finish()
    }
}
