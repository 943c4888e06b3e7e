//! TCP socket configuration
//!
//! Applies `TCP_NODELAY` and keepalive to freshly connected or accepted sockets.
//! Tokio sockets are already non-blocking.

use std::io;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use crate::config::ConnectConfig;

/// Configure a connected socket per `config`.
///
/// # Errors
///
/// Returns the OS error if an option cannot be set.
pub fn configure_tcp_socket(stream: &TcpStream, config: &ConnectConfig) -> io::Result<()> {
    if config.tcp_nodelay {
        stream.set_nodelay(true)?;
    }

    if let Some(time) = config.tcp_keepalive {
        let keepalive = TcpKeepalive::new().with_time(time);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

/// Like [`configure_tcp_socket`], but failures are logged and ignored.
pub(crate) fn configure_or_warn(stream: &TcpStream, config: &ConnectConfig) {
    if let Err(e) = configure_tcp_socket(stream, config) {
        tracing::warn!(error = %e, "failed to configure socket options");
    }
}

#[cfg(unix)]
pub(crate) fn raw_fd(stream: &TcpStream) -> Option<super::RawFd> {
    use std::os::fd::AsRawFd;
    Some(stream.as_raw_fd())
}

#[cfg(not(unix))]
pub(crate) fn raw_fd(_stream: &TcpStream) -> Option<super::RawFd> {
    None
}
