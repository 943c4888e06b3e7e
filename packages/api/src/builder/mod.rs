//! Fluent builders for servers and upstream connections

pub mod connection;
pub mod server;

pub use connection::ConnectionBuilder;
pub use server::{HandlerNotSet, HandlerSet, ServerBuilder};
