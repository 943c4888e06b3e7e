//! Plain and encrypted connections
//!
//! [`Connection`] is the capability every socket variant implements;
//! [`TcpConnection`] and [`TlsConnection`] are chosen at construction time.
//! [`Connector`] builds upstream connections for protocol handlers.

pub mod candidates;
pub mod connection;
pub mod connector;
mod io;
pub mod socket_config;
pub mod tcp;
pub mod tls;

pub use candidates::connect_candidates;
pub use connection::{Connection, ConnectionId, ConnectionProbe, ConnectionState, RawFd, Scheme};
pub use connector::Connector;
pub use socket_config::configure_tcp_socket;
pub use tcp::TcpConnection;
pub use tls::TlsConnection;
