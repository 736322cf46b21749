//! Device identity type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a configured receiver
///
/// Derived only from host and port so it survives process restarts and the
/// host can re-associate entities it created earlier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wraps an existing identifier (e.g. one parsed back from an entity id)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the identifier for `host:port`
    ///
    /// Every character that is not ASCII alphanumeric becomes `_`, so
    /// `192.168.1.100:14999` yields `anthem_192_168_1_100_14999`.
    pub fn from_address(host: &str, port: u16) -> Self {
        let host: String = host
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        Self(format!("anthem_{}_{}", host, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}
