//! System getaddrinfo-based DNS resolver

use std::net::SocketAddr;
use std::time::Duration;

use super::resolve::{Name, Resolve, Resolving, ip_literal};
use crate::error;

/// Resolver backed by the system's `getaddrinfo` via `tokio::net::lookup_host`.
#[derive(Debug, Clone)]
pub struct GaiResolver {
    prefer_ipv6: bool,
    timeout: Duration,
}

impl GaiResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefer_ipv6: false,
            timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn prefer_ipv6(mut self, prefer: bool) -> Self {
        self.prefer_ipv6 = prefer;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for GaiResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name, port: u16) -> Resolving {
        let prefer_ipv6 = self.prefer_ipv6;
        let timeout = self.timeout;

        Box::pin(async move {
            let host = name.as_str();
            if host.is_empty() {
                return Err(error::resolve("empty host name").with_target(host, port));
            }

            if let Some(addr) = ip_literal(host, port) {
                return Ok(vec![addr]);
            }

            let lookup = tokio::time::timeout(timeout, tokio::net::lookup_host((host, port)))
                .await
                .map_err(|elapsed| error::resolve(elapsed).with_target(host, port))?
                .map_err(|e| error::resolve(e).with_target(host, port))?;

            let mut addrs: Vec<SocketAddr> = lookup.collect();
            if addrs.is_empty() {
                return Err(error::no_candidates().with_target(host, port));
            }

            // stable: keeps getaddrinfo order within each family
            if prefer_ipv6 {
                addrs.sort_by_key(|addr| !addr.is_ipv6());
            }

            tracing::debug!(%host, port, candidates = addrs.len(), "resolved via getaddrinfo");
            Ok(addrs)
        })
    }
}
