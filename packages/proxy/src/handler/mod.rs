//! Per-connection session driving
//!
//! The embedding application supplies the protocol through
//! [`RequestHandler`]; a [`HandlerFactory`] creates one per accepted
//! connection. [`ConnectionHandler`] owns both and runs the session in its own
//! task.

mod connection_handler;
mod metered;

pub use connection_handler::{ConnectionHandler, HandlerState};
pub use metered::MeteredConnection;

use futures::future::BoxFuture;

use crate::buffer::BufferChain;
use crate::connect::{Connection, Connector};
use crate::manager::HandlerId;

/// Bytes of one request and its response, as seen by the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub request: BufferChain,
    pub response: BufferChain,
}

impl Transcript {
    #[must_use]
    pub fn new(request: BufferChain, response: BufferChain) -> Self {
        Self { request, response }
    }
}

/// Outcome of one request/response exchange.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    /// Run another exchange on the same connection.
    pub keep_alive: bool,
    /// Passed to the collector when present.
    pub transcript: Option<Transcript>,
}

impl Exchange {
    /// The client ended the session without a further request.
    #[must_use]
    pub fn end_of_session() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completed(transcript: Transcript, keep_alive: bool) -> Self {
        Self {
            keep_alive,
            transcript: Some(transcript),
        }
    }
}

/// What a request handler can reach besides its connection.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    id: HandlerId,
    connector: Connector,
}

impl HandlerContext {
    #[must_use]
    pub fn new(id: HandlerId, connector: Connector) -> Self {
        Self { id, connector }
    }

    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Factory for upstream connections.
    #[must_use]
    pub fn connector(&self) -> &Connector {
        &self.connector
    }
}

/// Protocol logic for one client session.
///
/// `exchange` is called repeatedly while the previous exchange asked for
/// keep-alive. Reads and writes go through `connection`; an error ends the
/// session.
pub trait RequestHandler: Send {
    fn exchange<'a>(
        &'a mut self,
        connection: &'a mut dyn Connection,
        context: &'a HandlerContext,
    ) -> BoxFuture<'a, crate::Result<Exchange>>;
}

/// Creates the request handler for a newly accepted connection.
pub trait HandlerFactory: Send + Sync + 'static {
    fn make_handler(&self, connection: &dyn Connection) -> Box<dyn RequestHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn(&dyn Connection) -> Box<dyn RequestHandler> + Send + Sync + 'static,
{
    fn make_handler(&self, connection: &dyn Connection) -> Box<dyn RequestHandler> {
        self(connection)
    }
}
