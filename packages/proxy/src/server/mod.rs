//! Listening endpoint and accept loop
//!
//! The server admits accepted sockets against the manager's ceiling, spawns a
//! [`ConnectionHandler`] task for each, fires the heartbeat and, on a signal
//! or a [`ShutdownHandle`] request, stops accepting and tears every
//! connection down.

mod heartbeat;
mod shutdown;

pub use heartbeat::{Heartbeat, LogHeartbeat};
pub use shutdown::ShutdownHandle;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, NullCollector};
use crate::config::{OverloadPolicy, ServerConfig, Validator};
use crate::connect::{Connection, Connector, TcpConnection, TlsConnection};
use crate::error;
use crate::handler::{ConnectionHandler, HandlerContext, HandlerFactory};
use crate::manager::ConnectionManager;
use crate::telemetry::{ServerStats, ServerStatsSnapshot};
use crate::tls::TlsServerConfig;

type Sessions = JoinSet<crate::Result<()>>;

/// Pause before accepting again after the listener runs out of resources.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Proxy server: accept loop plus the connection manager.
pub struct Server {
    config: ServerConfig,
    factory: Arc<dyn HandlerFactory>,
    collector: Arc<dyn Collector>,
    heartbeat: Arc<dyn Heartbeat>,
    tls: Option<TlsServerConfig>,
    connector: Connector,
    manager: Arc<ConnectionManager>,
    stats: Arc<ServerStats>,
    shutdown: CancellationToken,
    handle_signals: bool,
}

impl Server {
    /// # Errors
    ///
    /// Returns a `Config`-kind error if `config` does not validate.
    pub fn new(config: ServerConfig, factory: impl HandlerFactory) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            connector: Connector::new(config.connect.clone()),
            manager: Arc::new(ConnectionManager::new(config.max_connections)),
            factory: Arc::new(factory),
            collector: Arc::new(NullCollector),
            heartbeat: Arc::new(LogHeartbeat),
            tls: None,
            stats: Arc::new(ServerStats::new()),
            shutdown: CancellationToken::new(),
            handle_signals: true,
            config,
        })
    }

    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collector = collector;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Arc<dyn Heartbeat>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Terminate TLS on the listener; accepted sockets become `https` connections.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsServerConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Connector handed to request handlers for upstream connections.
    #[must_use]
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    /// Whether Ctrl-C and SIGTERM trigger shutdown. On by default.
    #[must_use]
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shutdown.clone())
    }

    #[must_use]
    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats
            .snapshot(self.manager.active_count(), self.manager.max_connections())
    }

    /// Builds a multi-threaded runtime with the configured worker count, binds
    /// the configured address and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns a `Config`-kind error if the runtime cannot start or the
    /// address cannot be bound, or the error that stopped the accept loop.
    pub fn listen(self) -> crate::Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .thread_name("marvin-worker")
            .enable_all()
            .build()
            .map_err(error::config)?;

        runtime.block_on(async move {
            let addr = self.config.socket_addr();
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| error::config(e).with_target(&addr.ip().to_string(), addr.port()))?;
            self.serve(listener).await
        })
    }

    /// Serves on an already bound listener, on the ambient runtime.
    ///
    /// # Errors
    ///
    /// Returns a `Transport`-kind error if the listener itself fails. Every
    /// connection is torn down before this returns, on success or failure.
    pub async fn serve(self, listener: TcpListener) -> crate::Result<()> {
        let local = listener.local_addr().ok();
        tracing::info!(
            addr = ?local,
            max_connections = self.config.max_connections,
            tls = self.tls.is_some(),
            "listening"
        );

        if self.handle_signals {
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = shutdown::shutdown_signal() => token.cancel(),
                    () = token.cancelled() => {}
                }
            });
        }

        let mut sessions = Sessions::new();
        let result = self.accept_loop(&listener, &mut sessions).await;
        drop(listener);

        self.teardown(sessions).await;
        // also releases the signal watcher
        self.shutdown.cancel();
        result
    }

    async fn accept_loop(&self, listener: &TcpListener, sessions: &mut Sessions) -> crate::Result<()> {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.reset();

        loop {
            if self.config.overload_policy == OverloadPolicy::Defer && !self.manager.admit() {
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => return Ok(()),
                    _ = heartbeat.tick() => self.beat(),
                    () = self.manager.slot_freed() => {}
                    Some(joined) = sessions.join_next() => log_session(joined),
                }
                continue;
            }

            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Ok(()),
                _ = heartbeat.tick() => self.beat(),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.on_accept(stream, peer, sessions),
                    Err(e) if is_fatal_accept_error(&e) => {
                        tracing::error!(error = %e, "listener failed");
                        return Err(error::transport(e));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        if let Some(pause) = accept_backoff(&e) {
                            tokio::time::sleep(pause).await;
                        }
                    }
                },
                Some(joined) = sessions.join_next() => log_session(joined),
            }
        }
    }

    fn on_accept(&self, stream: TcpStream, peer: SocketAddr, sessions: &mut Sessions) {
        self.stats.record_accept();

        if !self.manager.admit() {
            self.stats.record_reject();
            tracing::debug!(%peer, active = self.manager.active_count(), "at capacity, dropping connection");
            drop(stream);
            return;
        }

        let config = self.config.connect.clone();
        let mut connection: Box<dyn Connection> = match &self.tls {
            Some(tls) => Box::new(TlsConnection::accepted(stream, peer, config, tls.acceptor())),
            None => Box::new(TcpConnection::accepted(stream, peer, config)),
        };

        let id = self.manager.next_id();
        if let Err(e) = self.manager.register(id, connection.probe()) {
            if e.is_overload() {
                self.stats.record_reject();
            }
            tracing::debug!(%peer, error = %e, "registration refused");
            connection.close();
            return;
        }
        self.stats.record_admit();

        let handler = self.factory.make_handler(&*connection);
        let session = ConnectionHandler::new(
            connection,
            handler,
            HandlerContext::new(id, self.connector.clone()),
            self.collector.clone(),
            self.manager.clone(),
            self.stats.clone(),
        );
        tracing::debug!(%id, %peer, active = self.manager.active_count(), "connection admitted");
        sessions.spawn(session.run());
    }

    async fn teardown(&self, mut sessions: Sessions) {
        tracing::info!(active = self.manager.active_count(), "shutting down");
        self.manager.close_all();

        let grace = self.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = sessions.join_next().await {
                log_session(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(remaining = sessions.len(), ?grace, "grace period elapsed, aborting handlers");
            sessions.abort_all();
            while sessions.join_next().await.is_some() {}
        }

        let clean = self.manager.verify();
        if clean {
            tracing::info!("shutdown complete");
        } else {
            tracing::warn!("shutdown left connections open");
        }
    }

    fn beat(&self) {
        self.heartbeat.beat(&self.stats());
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

fn log_session(joined: Result<crate::Result<()>, JoinError>) {
    if let Err(e) = joined
        && e.is_panic()
    {
        tracing::error!(error = %e, "connection handler panicked");
    }
}

/// Errors after which the listener cannot accept again.
fn is_fatal_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::InvalidInput
    )
}

/// Per-connection failures retry at once; anything else (EMFILE, ENFILE,
/// ENOBUFS) would fail again immediately.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_errors_classified() {
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert!(!is_fatal_accept_error(&aborted));
        assert_eq!(accept_backoff(&aborted), None);

        let invalid = io::Error::from(io::ErrorKind::InvalidInput);
        assert!(is_fatal_accept_error(&invalid));
    }

    #[cfg(unix)]
    #[test]
    fn test_descriptor_exhaustion_backs_off() {
        // EMFILE
        let exhausted = io::Error::from_raw_os_error(24);
        assert!(!is_fatal_accept_error(&exhausted));
        assert_eq!(accept_backoff(&exhausted), Some(ACCEPT_BACKOFF));
    }
}
