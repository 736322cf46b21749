//! Change records pushed to the host

use std::fmt;

use anthem_protocol::ZoneNumber;
use anthem_state::{DeviceId, ZoneAttribute};

use crate::entity::EntityId;
use crate::volume::db_to_percent;

/// Whether a zone can currently be controlled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ZoneAvailability {
    /// No connection, or connected but the zone has not reported yet
    #[default]
    Unavailable,
    Available,
    /// Connected, but the zone stayed silent through the resync timeout
    NotResponding,
}

impl fmt::Display for ZoneAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZoneAvailability::Unavailable => "unavailable",
            ZoneAvailability::Available => "available",
            ZoneAvailability::NotResponding => "not responding",
        };
        f.write_str(name)
    }
}

/// What changed on a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneAttributeChange {
    Attribute(ZoneAttribute),
    Availability(ZoneAvailability),
    /// The device's input list (count or reported names) changed; re-read
    /// [`DeviceClient::input_list`](crate::DeviceClient::input_list)
    InputsChanged,
}

impl fmt::Display for ZoneAttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneAttributeChange::Attribute(attribute) => write!(f, "{}", attribute),
            ZoneAttributeChange::Availability(availability) => {
                write!(f, "availability={}", availability)
            }
            ZoneAttributeChange::InputsChanged => f.write_str("inputs changed"),
        }
    }
}

/// One accepted change on one zone of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneChange {
    pub device_id: DeviceId,
    pub zone: u8,
    pub change: ZoneAttributeChange,
}

impl ZoneChange {
    pub fn entity_id(&self) -> Option<EntityId> {
        ZoneNumber::new(self.zone)
            .ok()
            .map(|zone| EntityId::new(self.device_id.clone(), zone))
    }

    /// New volume in percent, for volume changes
    pub fn volume_percent(&self) -> Option<u8> {
        match self.change {
            ZoneAttributeChange::Attribute(ZoneAttribute::VolumeDb(db)) => Some(db_to_percent(db)),
            _ => None,
        }
    }
}

impl fmt::Display for ZoneChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_zone{}: {}", self.device_id, self.zone, self.change)
    }
}
