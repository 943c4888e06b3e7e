//! Listener settings
//!
//! Port, connection ceiling, worker count and heartbeat interval are fixed
//! before `listen()` and stay immutable for the lifetime of the `Server`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::connect::ConnectConfig;
use super::validation::{ConfigResult, ConfigValidator, Validator};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 9991;

const MAX_CONNECTIONS_LIMIT: usize = 1_000_000;
const MAX_WORKER_THREADS: usize = 1024;

/// What the accept loop does when every connection slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverloadPolicy {
    /// Accept, then immediately drop the socket. The client sees a reset.
    #[default]
    Reject,
    /// Stop accepting until a slot frees. Pending clients wait in the OS backlog.
    Defer,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Ceiling on concurrently serviced connections.
    pub max_connections: usize,
    /// Worker threads of the runtime built by `Server::listen`.
    pub worker_threads: usize,
    pub heartbeat_interval: Duration,
    pub overload_policy: OverloadPolicy,
    /// How long shutdown waits for handlers after closing their connections.
    pub shutdown_grace: Duration,
    /// Settings for accepted and upstream connections.
    pub connect: ConnectConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_connections: 100,
            worker_threads: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
            heartbeat_interval: Duration::from_millis(5000),
            overload_policy: OverloadPolicy::Reject,
            shutdown_grace: Duration::from_secs(5),
            connect: ConnectConfig::default(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    #[must_use]
    pub fn with_heartbeat_interval_ms(mut self, millis: u64) -> Self {
        self.heartbeat_interval = Duration::from_millis(millis);
        self
    }

    #[must_use]
    pub fn with_overload_policy(mut self, policy: OverloadPolicy) -> Self {
        self.overload_policy = policy;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_connect_config(mut self, connect: ConnectConfig) -> Self {
        self.connect = connect;
        self
    }

    /// Address the listener binds to.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Validator for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        ConfigValidator::validate_count(
            self.max_connections,
            MAX_CONNECTIONS_LIMIT,
            "max_connections",
        )?;
        ConfigValidator::validate_count(self.worker_threads, MAX_WORKER_THREADS, "worker_threads")?;
        ConfigValidator::validate_timeout(self.heartbeat_interval, "heartbeat_interval")?;
        ConfigValidator::validate_timeout(self.shutdown_grace, "shutdown_grace")?;
        self.connect.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(5000));
        assert_eq!(config.overload_policy, OverloadPolicy::Reject);
        assert!(config.worker_threads > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_fail_validation() {
        assert!(ServerConfig::default().with_max_connections(0).validate().is_err());
        assert!(ServerConfig::default().with_worker_threads(0).validate().is_err());
        assert!(ServerConfig::default().with_heartbeat_interval_ms(0).validate().is_err());
        let connect = ConnectConfig::default().with_connect_timeout(Some(Duration::ZERO));
        assert!(ServerConfig::default().with_connect_config(connect).validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig::default()
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(8080);
        assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse().unwrap());
    }
}
