//! Registry of live connection handlers
//!
//! The manager never owns a handler or its connection. It holds a
//! [`ConnectionProbe`] per handler, enough to enforce the ceiling, cancel
//! in-flight I/O on shutdown and check afterwards that everything closed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tokio::sync::Notify;

use crate::connect::ConnectionProbe;
use crate::error;

/// Identity of a handler within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Bounded set of active handlers. `active_count() <= max_connections()` always holds.
pub struct ConnectionManager {
    max_connections: usize,
    active: Mutex<HashMap<HandlerId, ConnectionProbe>>,
    /// Probes drained by `close_all`, kept for `verify`.
    retired: Mutex<Vec<ConnectionProbe>>,
    closed: AtomicBool,
    next_id: AtomicU64,
    freed: Notify,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            active: Mutex::new(HashMap::with_capacity(max_connections)),
            retired: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            freed: Notify::new(),
        }
    }

    fn active(&self) -> MutexGuard<'_, HashMap<HandlerId, ConnectionProbe>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retired(&self) -> MutexGuard<'_, Vec<ConnectionProbe>> {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether a new handler may be admitted right now.
    #[must_use]
    pub fn admit(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.active().len() < self.max_connections
    }

    /// Adds a handler to the active set.
    ///
    /// # Errors
    ///
    /// Returns an `Overload`-kind error if the ceiling was reached since
    /// `admit()`, a `Canceled`-kind error once `close_all` has run (the probe
    /// is cancelled) and a `Programming`-kind error for a duplicate id.
    pub fn register(&self, id: HandlerId, probe: ConnectionProbe) -> crate::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            probe.cancel();
            self.retired().push(probe);
            return Err(error::canceled());
        }

        let mut active = self.active();
        if active.contains_key(&id) {
            return Err(error::programming(format!("{id} registered twice")));
        }
        if active.len() >= self.max_connections {
            return Err(error::overload(active.len(), self.max_connections));
        }
        active.insert(id, probe);
        tracing::trace!(%id, active = active.len(), "handler registered");
        Ok(())
    }

    /// Removes a finished handler. Returns `false` if it was already gone.
    pub fn on_handler_finished(&self, id: HandlerId) -> bool {
        let removed = self.active().remove(&id).is_some();
        if removed {
            self.freed.notify_one();
            tracing::trace!(%id, "handler removed");
        }
        removed
    }

    /// Cancels every active connection and refuses later registrations.
    ///
    /// The active set is drained under the lock; cancellation happens after
    /// the lock is released. Returns how many connections were cancelled.
    pub fn close_all(&self) -> usize {
        self.closed.store(true, Ordering::Release);

        let drained: Vec<(HandlerId, ConnectionProbe)> = self.active().drain().collect();
        let count = drained.len();

        for (id, probe) in &drained {
            tracing::debug!(%id, state = ?probe.state(), "cancelling connection");
            probe.cancel();
        }

        self.retired().extend(drained.into_iter().map(|(_, probe)| probe));
        self.freed.notify_waiters();
        tracing::info!(count, "closed all connections");
        count
    }

    /// `true` when nothing is active and every drained connection reports closed.
    #[must_use]
    pub fn verify(&self) -> bool {
        if !self.active().is_empty() {
            return false;
        }
        self.retired().iter().all(ConnectionProbe::is_closed)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active().len()
    }

    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Completes once a slot has been released since the last wake-up, or
    /// when `close_all` runs.
    pub async fn slot_freed(&self) {
        self.freed.notified().await;
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("active", &self.active_count())
            .field("max_connections", &self.max_connections)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::ConnectionState;

    fn probe() -> ConnectionProbe {
        ConnectionProbe::new(ConnectionState::Open)
    }

    #[test]
    fn test_admission_ceiling() {
        let manager = ConnectionManager::new(2);
        let first = manager.next_id();
        let second = manager.next_id();

        assert!(manager.admit());
        manager.register(first, probe()).expect("first slot");
        assert!(manager.admit());
        manager.register(second, probe()).expect("second slot");
        assert!(!manager.admit());

        let err = manager.register(manager.next_id(), probe()).unwrap_err();
        assert!(err.is_overload());
        assert_eq!(manager.active_count(), 2);

        assert!(manager.on_handler_finished(first));
        assert!(manager.admit());
    }

    #[test]
    fn test_finish_twice_is_noop() {
        let manager = ConnectionManager::new(1);
        let id = manager.next_id();
        manager.register(id, probe()).expect("register");

        assert!(manager.on_handler_finished(id));
        assert!(!manager.on_handler_finished(id));
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let manager = ConnectionManager::new(4);
        let id = manager.next_id();
        manager.register(id, probe()).expect("register");
        assert!(manager.register(id, probe()).unwrap_err().is_programming());
    }

    #[test]
    fn test_close_all_cancels_and_verify_waits_for_closed() {
        let manager = ConnectionManager::new(4);
        let probes: Vec<_> = (0..3).map(|_| probe()).collect();
        for p in &probes {
            manager.register(manager.next_id(), p.clone()).expect("register");
        }

        assert_eq!(manager.close_all(), 3);
        assert_eq!(manager.active_count(), 0);
        assert!(probes.iter().all(ConnectionProbe::is_canceled));
        assert!(!manager.verify());

        for p in &probes {
            p.advance(ConnectionState::Closed);
        }
        assert!(manager.verify());
    }

    #[test]
    fn test_register_after_close_all_is_canceled() {
        let manager = ConnectionManager::new(4);
        manager.close_all();
        assert!(!manager.admit());

        let late = probe();
        let err = manager.register(manager.next_id(), late.clone()).unwrap_err();
        assert!(err.is_canceled());
        assert!(late.is_canceled());
        assert!(!manager.verify());
    }

    #[test]
    fn test_close_all_races_finishing_handlers() {
        use std::sync::Barrier;
        use std::sync::atomic::AtomicUsize;

        const TOTAL: usize = 64;
        const WORKERS: usize = 4;

        let manager = ConnectionManager::new(TOTAL);
        let entries: Vec<(HandlerId, ConnectionProbe)> =
            (0..TOTAL).map(|_| (manager.next_id(), probe())).collect();
        for (id, p) in &entries {
            manager.register(*id, p.clone()).expect("register");
        }

        let finished = AtomicUsize::new(0);
        let barrier = Barrier::new(WORKERS + 1);
        let closed = std::thread::scope(|scope| {
            for worker in 0..WORKERS {
                let (manager, entries) = (&manager, &entries);
                let (finished, barrier) = (&finished, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    // every other handler finishes on its own
                    for (id, _) in entries.iter().step_by(2).skip(worker).step_by(WORKERS) {
                        if manager.on_handler_finished(*id) {
                            finished.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
            let closer = scope.spawn(|| {
                barrier.wait();
                manager.close_all()
            });
            closer.join().expect("closer thread")
        });

        let finished = finished.into_inner();
        assert_eq!(manager.active_count(), 0);
        let canceled = entries.iter().filter(|(_, p)| p.is_canceled()).count();
        assert_eq!(canceled, closed);
        // each handler left the active set exactly once
        assert_eq!(finished + closed, TOTAL);
        assert!(closed >= TOTAL / 2);

        for (id, p) in &entries {
            assert!(!manager.on_handler_finished(*id));
            p.advance(ConnectionState::Closed);
        }
        assert!(manager.verify());
    }

    #[test]
    fn test_empty_manager_verifies() {
        assert!(ConnectionManager::new(1).verify());
    }
}
