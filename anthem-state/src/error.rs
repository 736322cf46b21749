//! Error types for anthem-state

use anthem_protocol::ModelFamily;
use thiserror::Error;

/// Result type for anthem-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors raised while building device descriptors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Zone count outside what the model family supports
    #[error("Invalid zone count {count} for {family} (expected 1-{max})")]
    InvalidZoneCount {
        count: u8,
        family: ModelFamily,
        max: u8,
    },

    /// TCP port 0
    #[error("Invalid port: 0")]
    InvalidPort,

    /// Host is empty or whitespace
    #[error("Host must not be empty")]
    EmptyHost,
}
