//! Marvin public API
//!
//! Fluent builders over the `marvin_proxy` connection substrate. Start a proxy
//! server with [`Marvin::server`] or open an upstream connection with
//! [`Marvin::connect`].

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod builder;

pub use builder::*;

pub use marvin_proxy::prelude;
pub use marvin_proxy::{
    BufferChain, Connection, ConnectionState, Error, Exchange, HandlerContext, Kind, RequestHandler,
    Result, Scheme, Segment, Server, ServerStatsSnapshot, ShutdownHandle, Transcript,
};

/// Main entry point providing static builder methods
pub struct Marvin;

impl Marvin {
    /// Start configuring a proxy server.
    #[must_use]
    pub fn server() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Start configuring an upstream connection to `target`, a
    /// `scheme://host[:port]` URL. Parse errors surface from `build`/`open`.
    #[must_use]
    pub fn connect(target: &str) -> ConnectionBuilder {
        ConnectionBuilder::new(target)
    }
}

/// Shorthand for [`Marvin::server`].
#[must_use]
pub fn server() -> ServerBuilder {
    Marvin::server()
}

/// Shorthand for [`Marvin::connect`].
#[must_use]
pub fn connect(target: &str) -> ConnectionBuilder {
    Marvin::connect(target)
}
