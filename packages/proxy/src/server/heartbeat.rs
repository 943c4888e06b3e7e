//! Periodic heartbeat callback

use crate::telemetry::ServerStatsSnapshot;

/// Invoked on every heartbeat tick from the accept loop. Must return quickly.
pub trait Heartbeat: Send + Sync + 'static {
    fn beat(&self, stats: &ServerStatsSnapshot);
}

impl<F> Heartbeat for F
where
    F: Fn(&ServerStatsSnapshot) + Send + Sync + 'static,
{
    fn beat(&self, stats: &ServerStatsSnapshot) {
        self(stats);
    }
}

/// Default heartbeat: one debug line per tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHeartbeat;

impl Heartbeat for LogHeartbeat {
    fn beat(&self, stats: &ServerStatsSnapshot) {
        tracing::debug!(
            active = stats.active,
            max = stats.max_connections,
            accepted = stats.accepted,
            rejected = stats.rejected,
            completed = stats.completed,
            failed = stats.failed,
            exchanges = stats.exchanges,
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "heartbeat"
        );
    }
}
