//! DNS resolution trait and names

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use futures::future::BoxFuture;

/// Future returned by [`Resolve::resolve`], yielding candidates in preference order.
pub type Resolving = BoxFuture<'static, crate::Result<Vec<SocketAddr>>>;

/// Resolves a hostname into connect candidates.
///
/// Implementations return a `Resolve`-kind error when nothing resolves; an
/// empty `Ok` is treated the same way by callers.
pub trait Resolve: Send + Sync + 'static {
    fn resolve(&self, name: Name, port: u16) -> Resolving;
}

/// DNS name representation for hostname resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

impl Name {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

/// Fast path for IP literals, including bracketed IPv6 (`[::1]`).
#[must_use]
pub fn ip_literal(host: &str, port: u16) -> Option<SocketAddr> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    IpAddr::from_str(trimmed)
        .ok()
        .map(|ip| SocketAddr::new(ip, port))
}
