//! Ordered walk over resolved endpoint candidates

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use crate::error::{self, NoCandidates};

/// Tries `attempt` on each candidate in order and returns the first success.
///
/// A failed attempt's resources are dropped before the next candidate is
/// tried. When every candidate fails the result is a `Connect`-kind error
/// carrying the last observed failure. The future completes exactly once.
///
/// # Errors
///
/// Returns a `Connect`-kind error on exhaustion, or when `candidates` is empty.
pub async fn connect_candidates<T, E, F, Fut>(
    candidates: &[SocketAddr],
    mut attempt: F,
) -> crate::Result<T>
where
    F: FnMut(SocketAddr) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Box<dyn StdError + Send + Sync>> + fmt::Display,
{
    let total = candidates.len();
    let mut last_error: Option<Box<dyn StdError + Send + Sync>> = None;

    for (index, &addr) in candidates.iter().enumerate() {
        tracing::debug!(candidate = %addr, attempt = index + 1, total, "connecting to candidate");
        match attempt(addr).await {
            Ok(connected) => {
                tracing::debug!(candidate = %addr, "candidate accepted connection");
                return Ok(connected);
            }
            Err(e) => {
                tracing::debug!(candidate = %addr, error = %e, "candidate failed");
                last_error = Some(e.into());
            }
        }
    }

    Err(match last_error {
        Some(e) => error::connect(e),
        None => error::connect(NoCandidates),
    })
}
