//! Zone addressing

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProtocolError, Result};

/// A zone number accepted by the receiver for zone-level commands
///
/// Anthem receivers address at most three zones. Responses may still carry
/// other zone numbers, so decoded events keep the raw `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ZoneNumber(u8);

impl ZoneNumber {
    /// Main zone
    pub const MAIN: ZoneNumber = ZoneNumber(1);

    /// Highest zone number the protocol addresses
    pub const MAX: u8 = 3;

    /// Creates a zone number, rejecting anything outside 1-3
    pub fn new(zone: u8) -> Result<Self> {
        if (1..=Self::MAX).contains(&zone) {
            Ok(Self(zone))
        } else {
            Err(ProtocolError::InvalidZone(zone))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zones `1..=count`, capped at [`ZoneNumber::MAX`]
    pub fn up_to(count: u8) -> impl Iterator<Item = ZoneNumber> {
        (1..=count.min(Self::MAX)).map(ZoneNumber)
    }
}

impl fmt::Display for ZoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for ZoneNumber {
    type Error = ProtocolError;

    fn try_from(zone: u8) -> Result<Self> {
        ZoneNumber::new(zone)
    }
}

impl From<ZoneNumber> for u8 {
    fn from(zone: ZoneNumber) -> u8 {
        zone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_zones() {
        for n in 1..=3 {
            assert_eq!(ZoneNumber::new(n).unwrap().get(), n);
        }
    }

    #[test]
    fn test_invalid_zones() {
        assert_eq!(ZoneNumber::new(0), Err(ProtocolError::InvalidZone(0)));
        assert_eq!(ZoneNumber::new(4), Err(ProtocolError::InvalidZone(4)));
    }

    #[test]
    fn test_up_to_caps_at_max() {
        let zones: Vec<u8> = ZoneNumber::up_to(5).map(ZoneNumber::get).collect();
        assert_eq!(zones, vec![1, 2, 3]);

        let zones: Vec<u8> = ZoneNumber::up_to(2).map(ZoneNumber::get).collect();
        assert_eq!(zones, vec![1, 2]);
    }
}
