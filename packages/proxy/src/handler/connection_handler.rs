//! Session state machine for one accepted connection

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::metered::MeteredConnection;
use super::{HandlerContext, RequestHandler, Transcript};
use crate::collector::Collector;
use crate::connect::{Connection, ConnectionProbe, ConnectionState};
use crate::error;
use crate::manager::{ConnectionManager, HandlerId};
use crate::telemetry::ServerStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandlerState {
    Created,
    Resolving,
    Connecting,
    Active,
    Draining,
    Finished,
}

/// Owns one connection and its request handler for the whole session.
///
/// The manager is told when the handler finishes, whether `run` returns,
/// fails or the task is aborted.
pub struct ConnectionHandler {
    id: HandlerId,
    state: HandlerState,
    connection: MeteredConnection,
    handler: Box<dyn RequestHandler>,
    context: HandlerContext,
    collector: Arc<dyn Collector>,
    manager: Arc<ConnectionManager>,
    stats: Arc<ServerStats>,
}

impl ConnectionHandler {
    /// The handler must already be registered with `manager` under `id`.
    #[must_use]
    pub fn new(
        connection: Box<dyn Connection>,
        handler: Box<dyn RequestHandler>,
        context: HandlerContext,
        collector: Arc<dyn Collector>,
        manager: Arc<ConnectionManager>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            id: context.id(),
            state: HandlerState::Created,
            connection: MeteredConnection::new(connection, stats.clone()),
            handler,
            context,
            collector,
            manager,
            stats,
        }
    }

    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> HandlerState {
        self.state
    }

    #[must_use]
    pub fn probe(&self) -> ConnectionProbe {
        self.connection.probe()
    }

    /// Runs the session to completion. The connection is closed and the
    /// manager notified before this returns.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session early.
    pub async fn run(mut self) -> crate::Result<()> {
        let result = self.drive().await;
        self.finish(&result);
        result
    }

    async fn drive(&mut self) -> crate::Result<()> {
        match self.connection.state() {
            ConnectionState::Open => {}
            ConnectionState::Unconnected => {
                // accepted sockets already have a peer and skip resolution
                if self.connection.peer_addr().is_some() {
                    self.transition(HandlerState::Connecting);
                } else {
                    self.transition(HandlerState::Resolving);
                }
                self.connection.connect().await?;
            }
            _ => return Err(error::canceled()),
        }

        self.transition(HandlerState::Active);
        let token = self.connection.probe().token().clone();
        loop {
            let exchange = tokio::select! {
                biased;
                () = token.cancelled() => Err(error::canceled()),
                exchange = self.handler.exchange(&mut self.connection, &self.context) => exchange,
            }?;

            if let Some(transcript) = &exchange.transcript {
                self.stats.record_exchange();
                self.collect(transcript);
            }
            if !exchange.keep_alive {
                break;
            }
        }

        self.transition(HandlerState::Draining);
        if let Err(e) = self.connection.drain().await {
            tracing::debug!(id = %self.id, error = %e, "drain failed");
        }
        Ok(())
    }

    fn collect(&self, transcript: &Transcript) {
        let scheme = self.connection.scheme();
        let host = self.connection.host();
        let collected = catch_unwind(AssertUnwindSafe(|| {
            self.collector
                .collect(scheme, host, &transcript.request, &transcript.response);
        }));
        if collected.is_err() {
            tracing::error!(id = %self.id, host, "collector panicked, record dropped");
        }
    }

    fn finish(&mut self, result: &crate::Result<()>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_canceled() => {
                tracing::debug!(id = %self.id, "session canceled");
            }
            Err(e) => {
                tracing::warn!(id = %self.id, host = %self.connection.host(), error = %e, "session failed");
            }
        }
        let failed = matches!(result, Err(e) if !e.is_canceled());
        self.stats.record_finish(failed);
        self.release();
    }

    fn release(&mut self) {
        if self.state == HandlerState::Finished {
            return;
        }
        if self.state != HandlerState::Draining {
            self.transition(HandlerState::Draining);
        }
        self.connection.close();
        self.transition(HandlerState::Finished);
        self.manager.on_handler_finished(self.id);
    }

    fn transition(&mut self, next: HandlerState) {
        tracing::trace!(id = %self.id, from = ?self.state, to = ?next, "handler state");
        self.state = next;
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("connection", &self.connection.id())
            .finish()
    }
}
