//! Error types for anthem-protocol

use thiserror::Error;

/// Errors produced while encoding commands or classifying response lines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Zone number outside the range the protocol addresses
    #[error("Invalid zone number: {0} (expected 1-3)")]
    InvalidZone(u8),

    /// Command value cannot be encoded for this command code
    #[error("Value out of range for {code}: {value}")]
    ValueOutOfRange { code: &'static str, value: i32 },

    /// Zone-level command encoded without a zone prefix
    #[error("Command {0} requires a zone prefix")]
    MissingZone(&'static str),

    /// Device-level command encoded with a zone prefix
    #[error("Command {0} does not take a zone prefix")]
    UnexpectedZone(&'static str),

    /// Model family string not recognized
    #[error("Unknown model family: {0}")]
    UnknownModelFamily(String),

    /// A received line could not be classified
    #[error("Failed to decode line {line:?}: {reason}")]
    Decode { line: String, reason: String },
}

impl ProtocolError {
    pub(crate) fn decode(line: &str, reason: impl Into<String>) -> Self {
        ProtocolError::Decode {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for anthem-protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtocolError::InvalidZone(4).to_string(),
            "Invalid zone number: 4 (expected 1-3)"
        );

        let error = ProtocolError::ValueOutOfRange {
            code: "VOL",
            value: 12,
        };
        assert_eq!(error.to_string(), "Value out of range for VOL: 12");

        let error = ProtocolError::decode("Z1VOLxx", "volume is not numeric");
        assert!(error.to_string().contains("Z1VOLxx"));
        assert!(error.to_string().contains("volume is not numeric"));
    }
}
