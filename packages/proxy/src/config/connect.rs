//! Outbound connection settings

use std::time::Duration;

use super::validation::{ConfigResult, ConfigValidator, Validator};

/// Settings applied when establishing and driving a connection.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Timeout for each individual candidate address. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Timeout for the TLS handshake.
    pub handshake_timeout: Option<Duration>,
    /// Timeout for a single read or a complete write. `None` disables it.
    pub io_timeout: Option<Duration>,
    pub tcp_nodelay: bool,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            handshake_timeout: Some(Duration::from_secs(10)),
            io_timeout: None,
            tcp_nodelay: true,
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

impl ConnectConfig {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }

    #[must_use]
    pub fn with_tcp_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.tcp_keepalive = keepalive;
        self
    }
}

impl Validator for ConnectConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(timeout) = self.connect_timeout {
            ConfigValidator::validate_timeout(timeout, "connect_timeout")?;
        }
        if let Some(timeout) = self.handshake_timeout {
            ConfigValidator::validate_timeout(timeout, "handshake_timeout")?;
        }
        if let Some(timeout) = self.io_timeout {
            ConfigValidator::validate_timeout(timeout, "io_timeout")?;
        }
        if let Some(keepalive) = self.tcp_keepalive {
            ConfigValidator::validate_timeout(keepalive, "tcp_keepalive")?;
        }
        Ok(())
    }
}
