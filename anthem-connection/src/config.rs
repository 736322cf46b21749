//! Configuration types for the anthem-connection crate

use std::time::Duration;

use anthem_protocol::DEFAULT_MAX_LINE_LENGTH;

use crate::error::{ConnectionError, Result};

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager)
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for a single TCP connect attempt
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Timeout for writing one command line (or the resync burst)
    /// Default: 5 seconds
    pub write_timeout: Duration,

    /// First reconnect delay; doubled after each failed attempt
    /// Default: 1 second
    pub backoff_base: Duration,

    /// Upper bound for the reconnect delay
    /// Default: 30 seconds
    pub backoff_max: Duration,

    /// Read silence after which a liveness probe is written
    /// Default: 120 seconds
    pub idle_timeout: Duration,

    /// Size of the socket read buffer
    /// Default: 1024 bytes
    pub read_buffer_size: usize,

    /// Longest unterminated line kept before it is discarded
    /// Default: 256 bytes
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
            read_buffer_size: 1024,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(ConnectionError::Configuration(
                "Connect and write timeouts must be greater than 0".to_string(),
            ));
        }

        if self.backoff_base.is_zero() || self.backoff_base > self.backoff_max {
            return Err(ConnectionError::Configuration(
                "Invalid backoff: base must be non-zero and not exceed max".to_string(),
            ));
        }

        if self.idle_timeout.is_zero() {
            return Err(ConnectionError::Configuration(
                "Idle timeout must be greater than 0".to_string(),
            ));
        }

        if self.read_buffer_size == 0 || self.max_line_length == 0 {
            return Err(ConnectionError::Configuration(
                "Buffer sizes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}
