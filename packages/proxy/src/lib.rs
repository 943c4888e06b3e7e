//! # Marvin proxy core
//!
//! Connection management and I/O substrate for an intercepting HTTP/HTTPS
//! proxy. Protocol parsing and certificate policy live in the embedding
//! application; this crate provides everything underneath them.
//!
//! ## Features
//!
//! - **`BufferChain`** of shared segments for vectored, copy-free writes
//! - **Plain and TLS connections** behind one `Connection` trait, with ordered
//!   candidate fallback on connect
//! - **Bounded connection manager** with shutdown verification
//! - **Server** with reject-or-defer overload policy, heartbeat and
//!   signal-driven graceful shutdown
//! - **Pluggable DNS** via the system resolver or hickory
//!
//! ## Usage
//!
//! ```rust,no_run
//! use marvin_proxy::prelude::*;
//! use futures::future::BoxFuture;
//!
//! struct Echo;
//!
//! impl RequestHandler for Echo {
//!     fn exchange<'a>(
//!         &'a mut self,
//!         connection: &'a mut dyn Connection,
//!         _context: &'a HandlerContext,
//!     ) -> BoxFuture<'a, marvin_proxy::Result<Exchange>> {
//!         Box::pin(async move {
//!             let mut segment = read_segment();
//!             if connection.read(&mut segment).await? == 0 {
//!                 return Ok(Exchange::end_of_session());
//!             }
//!             let request = BufferChain::from(segment);
//!             connection.write(&request).await?;
//!             Ok(Exchange::completed(Transcript::new(request.clone(), request), true))
//!         })
//!     }
//! }
//!
//! fn main() -> marvin_proxy::Result<()> {
//!     let factory = |_: &dyn Connection| Box::new(Echo) as Box<dyn RequestHandler>;
//!     Server::new(ServerConfig::default(), factory)?.listen()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod buffer;
pub mod collector;
pub mod config;
pub mod connect;
pub mod dns;
pub mod error;
pub mod handler;
pub mod manager;
pub mod prelude;
pub mod server;
pub mod telemetry;
pub mod tls;

pub use buffer::{BufferChain, Segment};
pub use collector::{ChannelCollector, CollectedExchange, Collector, NullCollector};
pub use config::{ConnectConfig, OverloadPolicy, ServerConfig};
pub use connect::{
    Connection, ConnectionProbe, ConnectionState, Connector, Scheme, TcpConnection, TlsConnection,
};
pub use error::{Error, Kind, Result};
pub use handler::{
    ConnectionHandler, Exchange, HandlerContext, HandlerFactory, HandlerState, RequestHandler,
    Transcript,
};
pub use manager::{ConnectionManager, HandlerId};
pub use server::{Heartbeat, LogHeartbeat, Server, ShutdownHandle};
pub use telemetry::{ServerStats, ServerStatsSnapshot};
