//! Lock-free server statistics with cache-padded atomic counters
//!
//! Accept-loop counters and handler counters are bumped from different worker
//! threads, so each counter sits on its own cache line.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

/// Thread-safe server counters shared by the accept loop and every handler.
#[derive(Debug)]
pub struct ServerStats {
    started: Instant,
    /// Sockets returned by `accept`
    pub accepted: CachePadded<AtomicUsize>,
    /// Sockets dropped because the ceiling was reached
    pub rejected: CachePadded<AtomicUsize>,
    /// Sockets that got a handler
    pub admitted: CachePadded<AtomicUsize>,
    /// Handlers that finished without error
    pub completed: CachePadded<AtomicUsize>,
    /// Handlers that finished on an error
    pub failed: CachePadded<AtomicUsize>,
    /// Request/response exchanges performed across all handlers
    pub exchanges: CachePadded<AtomicUsize>,
    pub bytes_read: CachePadded<AtomicU64>,
    pub bytes_written: CachePadded<AtomicU64>,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            accepted: CachePadded::default(),
            rejected: CachePadded::default(),
            admitted: CachePadded::default(),
            completed: CachePadded::default(),
            failed: CachePadded::default(),
            exchanges: CachePadded::default(),
            bytes_read: CachePadded::default(),
            bytes_written: CachePadded::default(),
        }
    }
}

/// Point-in-time copy of [`ServerStats`], handed to the heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub uptime: Duration,
    /// Handlers live at the time of the snapshot
    pub active: usize,
    pub max_connections: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub admitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub exchanges: usize,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl ServerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_admit(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_finish(&self, failed: bool) {
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_exchange(&self) {
        self.exchanges.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Reads every counter with relaxed ordering; values are individually
    /// accurate but not a consistent cut across counters.
    #[must_use]
    pub fn snapshot(&self, active: usize, max_connections: usize) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            uptime: self.started.elapsed(),
            active,
            max_connections,
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = ServerStats::new();
        stats.record_accept();
        stats.record_accept();
        stats.record_reject();
        stats.record_admit();
        stats.record_finish(false);
        stats.record_read(10);
        stats.record_written(4);

        let snapshot = stats.snapshot(0, 8);
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.admitted, 1);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.bytes_read, 10);
        assert_eq!(snapshot.bytes_written, 4);
        assert_eq!(snapshot.max_connections, 8);
    }
}
