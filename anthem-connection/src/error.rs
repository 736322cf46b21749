//! Error types for the anthem-connection crate.

use anthem_protocol::ProtocolError;

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors raised by the connection manager
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// No live socket; the command was not sent
    #[error("Not connected")]
    NotConnected,

    /// TCP connect failed
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// An operation exceeded its configured timeout
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// The session ended (peer closed, write failed, probe unanswered)
    #[error("Connection lost: {0}")]
    Closed(&'static str),

    /// Socket-level I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command could not be encoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ConnectionError {
    /// Transport failures end the current session and trigger a reconnect
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectFailed { .. }
                | ConnectionError::Timeout(_)
                | ConnectionError::Closed(_)
                | ConnectionError::Io(_)
        )
    }
}
