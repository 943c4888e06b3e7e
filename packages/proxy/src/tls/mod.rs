//! TLS configuration for the encrypted connection variant
//!
//! Client side builds a rustls `ClientConfig` over system, bundled and custom
//! roots. Server side wraps an embedding-supplied `ServerConfig` (the
//! interception policy that picks certificates lives outside this crate).

pub mod client;
pub mod errors;
pub mod server;

pub use client::TlsClientConfig;
pub use errors::TlsError;
pub use server::TlsServerConfig;

use std::sync::Arc;

use rustls::crypto::CryptoProvider;

/// Crypto provider used for every config this crate builds.
pub(crate) fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}
