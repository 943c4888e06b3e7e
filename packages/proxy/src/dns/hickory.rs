//! DNS resolution via the [hickory-resolver](https://github.com/hickory-dns/hickory-dns) crate

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use hickory_resolver::config::LookupIpStrategy;
use hickory_resolver::{ResolveError, TokioResolver};
use tokio::sync::OnceCell;

use super::resolve::{Name, Resolve, Resolving, ip_literal};
use crate::error;

/// Asynchronous resolver reading the system configuration on first use.
#[derive(Default, Clone)]
pub struct HickoryResolver {
    state: Arc<OnceCell<TokioResolver>>,
}

impl fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryResolver")
            .field("initialized", &self.state.initialized())
            .finish()
    }
}

#[derive(Debug)]
struct HickoryDnsSystemConfError(ResolveError);

impl HickoryResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name, port: u16) -> Resolving {
        let state = self.state.clone();

        Box::pin(async move {
            let host = name.as_str();
            if let Some(addr) = ip_literal(host, port) {
                return Ok(vec![addr]);
            }

            let resolver = state
                .get_or_try_init(|| async { new_resolver() })
                .await
                .map_err(|e| error::resolve(e).with_target(host, port))?;

            let lookup = resolver
                .lookup_ip(host)
                .await
                .map_err(|e| error::resolve(e).with_target(host, port))?;

            let addrs: Vec<SocketAddr> = lookup
                .iter()
                .map(|ip| SocketAddr::new(ip, port))
                .collect();
            if addrs.is_empty() {
                return Err(error::no_candidates().with_target(host, port));
            }

            tracing::debug!(%host, port, candidates = addrs.len(), "resolved via hickory");
            Ok(addrs)
        })
    }
}

/// Create a resolver from the system configuration (`/etc/resolv.conf`),
/// looking up both IPv4 and IPv6 so every family becomes a candidate.
fn new_resolver() -> Result<TokioResolver, HickoryDnsSystemConfError> {
    let mut builder = TokioResolver::builder_tokio().map_err(HickoryDnsSystemConfError)?;
    builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    Ok(builder.build())
}

impl fmt::Display for HickoryDnsSystemConfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error reading DNS system conf for hickory-dns")
    }
}

impl std::error::Error for HickoryDnsSystemConfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
