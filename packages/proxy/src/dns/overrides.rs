//! DNS resolver with hostname overrides
//!
//! Pins hostnames to fixed candidate lists, for tests and custom routing.
//! Unknown names fall through to an inner resolver when one is configured.

use std::net::SocketAddr;
use std::sync::Arc;

use hashbrown::HashMap;

use super::resolve::{Name, Resolve, Resolving};
use crate::error;

/// Resolver answering from a fixed table.
///
/// A stored address with port `0` takes the port of the lookup.
#[derive(Clone, Default)]
pub struct StaticResolver {
    overrides: Arc<HashMap<String, Vec<SocketAddr>>>,
    fallback: Option<Arc<dyn Resolve>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `host` to `addrs`, tried in the given order.
    #[must_use]
    pub fn with_override(mut self, host: impl Into<String>, addrs: Vec<SocketAddr>) -> Self {
        Arc::make_mut(&mut self.overrides).insert(host.into(), addrs);
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.fallback = Some(resolver);
        self
    }
}

impl std::fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticResolver")
            .field("overrides", &self.overrides)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, name: Name, port: u16) -> Resolving {
        if let Some(addrs) = self.overrides.get(name.as_str()) {
            let addrs: Vec<SocketAddr> = addrs
                .iter()
                .map(|addr| {
                    if addr.port() == 0 {
                        SocketAddr::new(addr.ip(), port)
                    } else {
                        *addr
                    }
                })
                .collect();
            return Box::pin(async move {
                if addrs.is_empty() {
                    Err(error::no_candidates().with_target(name.as_str(), port))
                } else {
                    Ok(addrs)
                }
            });
        }

        match &self.fallback {
            Some(resolver) => resolver.resolve(name, port),
            None => Box::pin(async move {
                Err(error::resolve("host not found in static table")
                    .with_target(name.as_str(), port))
            }),
        }
    }
}
