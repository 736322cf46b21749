//! Host-facing entity identifiers

use std::fmt;
use std::str::FromStr;

use anthem_protocol::ZoneNumber;
use anthem_state::DeviceId;

use crate::error::SdkError;

/// `{device-id}_zone{n}`, stable across restarts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    device_id: DeviceId,
    zone: ZoneNumber,
}

impl EntityId {
    pub fn new(device_id: DeviceId, zone: ZoneNumber) -> Self {
        Self { device_id, zone }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn zone(&self) -> ZoneNumber {
        self.zone
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_zone{}", self.device_id, self.zone)
    }
}

impl FromStr for EntityId {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SdkError::InvalidEntityId(s.to_string());

        let (device, zone) = s.rsplit_once("_zone").ok_or_else(invalid)?;
        if device.is_empty() {
            return Err(invalid());
        }
        let zone = zone
            .parse::<u8>()
            .ok()
            .and_then(|zone| ZoneNumber::new(zone).ok())
            .ok_or_else(invalid)?;

        Ok(Self::new(DeviceId::new(device), zone))
    }
}
