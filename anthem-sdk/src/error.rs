use anthem_connection::ConnectionError;
use anthem_protocol::ProtocolError;
use anthem_state::{DeviceId, StateError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Error, Debug)]
pub enum SdkError {
    /// Socket-level failure; the connection manager keeps retrying
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid zone {zone} (device has {zone_count} zones)")]
    InvalidZone { zone: u8, zone_count: u8 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Toggle requested before the receiver reported the attribute
    #[error("Unknown {attribute} state for zone {zone}")]
    UnknownState { zone: u8, attribute: &'static str },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Device already registered: {0}")]
    DuplicateDevice(DeviceId),

    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid device descriptor: {0}")]
    Descriptor(#[from] StateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConnectionError> for SdkError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::NotConnected => SdkError::NotConnected,
            ConnectionError::Protocol(error) => SdkError::Protocol(error),
            ConnectionError::Configuration(message) => SdkError::Configuration(message),
            other => SdkError::ConnectionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_mapping() {
        assert!(matches!(
            SdkError::from(ConnectionError::NotConnected),
            SdkError::NotConnected
        ));
        assert!(matches!(
            SdkError::from(ConnectionError::Timeout("write")),
            SdkError::ConnectionFailed(_)
        ));
    }

    #[test]
    fn test_display() {
        let error = SdkError::UnknownState {
            zone: 1,
            attribute: "mute",
        };
        assert_eq!(error.to_string(), "Unknown mute state for zone 1");
        let error = SdkError::InvalidZone {
            zone: 3,
            zone_count: 2,
        };
        assert_eq!(error.to_string(), "Invalid zone 3 (device has 2 zones)");
    }
}
