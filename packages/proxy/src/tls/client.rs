//! Client-side TLS configuration for upstream connections

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};

use super::errors::TlsError;

/// Root store and protocol options for outbound TLS.
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    /// Load the platform's trusted roots.
    pub use_system_certs: bool,
    /// Add the bundled Mozilla roots (also used when system roots fail to load).
    pub use_webpki_roots: bool,
    /// Extra PEM-encoded roots.
    pub custom_root_certs: Vec<String>,
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Send TLS 1.3 early data on resumed sessions.
    pub enable_early_data: bool,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        Self {
            use_system_certs: true,
            use_webpki_roots: true,
            custom_root_certs: Vec::new(),
            alpn_protocols: Vec::new(),
            enable_early_data: false,
        }
    }
}

impl TlsClientConfig {
    /// Trust only the given PEM roots.
    #[must_use]
    pub fn with_only_roots(pem: impl Into<String>) -> Self {
        Self {
            use_system_certs: false,
            use_webpki_roots: false,
            custom_root_certs: vec![pem.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_root_cert(mut self, pem: impl Into<String>) -> Self {
        self.custom_root_certs.push(pem.into());
        self
    }

    #[must_use]
    pub fn with_alpn(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.alpn_protocols = protocols;
        self
    }

    #[must_use]
    pub fn with_early_data(mut self, enabled: bool) -> Self {
        self.enable_early_data = enabled;
        self
    }

    /// Build the rustls client configuration.
    ///
    /// # Errors
    ///
    /// Returns `TlsError` if a custom root cannot be parsed or the root store
    /// ends up empty.
    pub fn build(&self) -> Result<Arc<ClientConfig>, TlsError> {
        let mut root_store = RootCertStore::empty();

        if self.use_system_certs {
            let cert_result = rustls_native_certs::load_native_certs();
            for cert in cert_result.certs {
                if let Err(e) = root_store.add(cert) {
                    tracing::warn!("Failed to add system certificate: {}", e);
                }
            }

            if !cert_result.errors.is_empty() {
                for err in &cert_result.errors {
                    tracing::warn!("Certificate load error: {}", err);
                }
                root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }

            tracing::debug!("Loaded {} system certificates", root_store.len());
        }

        if self.use_webpki_roots {
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }

        for pem in &self.custom_root_certs {
            for cert in parse_certificates(pem)? {
                root_store
                    .add(cert)
                    .map_err(|e| TlsError::CertificateParsing(e.to_string()))?;
            }
        }

        if root_store.is_empty() {
            return Err(TlsError::EmptyRootStore);
        }

        let mut config = ClientConfig::builder_with_provider(super::provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        config.alpn_protocols.clone_from(&self.alpn_protocols);
        config.enable_early_data = self.enable_early_data;

        Ok(Arc::new(config))
    }
}

/// Parse every certificate in a PEM bundle.
///
/// # Errors
///
/// Returns `TlsError::CertificateParsing` on malformed PEM or when the bundle
/// holds no certificate.
pub fn parse_certificates(pem: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::CertificateParsing(e.to_string()))?;
    if certs.is_empty() {
        return Err(TlsError::CertificateParsing(
            "no certificate found in PEM data".to_string(),
        ));
    }
    Ok(certs)
}

/// Server name to present in SNI and verify against.
///
/// # Errors
///
/// Returns `TlsError::InvalidServerName` for hosts that are neither a DNS name
/// nor an IP address.
pub fn server_name(host: &str) -> Result<ServerName<'static>, TlsError> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    ServerName::try_from(trimmed.to_string())
        .map_err(|e| TlsError::InvalidServerName(format!("'{host}': {e}")))
}
