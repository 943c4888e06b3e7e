//! TLS-specific error types for detailed error handling

/// TLS-specific error types for detailed error handling
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Certificate parsing failed: {0}")]
    CertificateParsing(String),
    #[error("Private key parsing failed: {0}")]
    KeyParsing(String),
    #[error("Invalid server name {0}")]
    InvalidServerName(String),
    #[error("No trusted root certificates available")]
    EmptyRootStore,
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TlsError> for crate::Error {
    fn from(error: TlsError) -> Self {
        match error {
            TlsError::InvalidServerName(_) | TlsError::Io(_) => crate::error::handshake(error),
            _ => crate::error::config(error),
        }
    }
}
