//! Snapshot types for zone and device state

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Last known state of one zone
///
/// `None` means the receiver has not reported the attribute yet. That is
/// distinct from `Some(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    pub zone: u8,
    pub power: Option<bool>,
    pub volume_db: Option<i32>,
    pub muted: Option<bool>,
    pub active_input: Option<u8>,
    pub input_name: Option<String>,
    pub audio_format: Option<String>,
    pub listening_mode: Option<u8>,
    /// Time of the last accepted event for this zone
    pub last_updated: Option<DateTime<Utc>>,
}

impl ZoneState {
    /// State with every attribute unknown
    pub fn unknown(zone: u8) -> Self {
        Self {
            zone,
            power: None,
            volume_db: None,
            muted: None,
            active_input: None,
            input_name: None,
            audio_format: None,
            listening_mode: None,
            last_updated: None,
        }
    }

    /// True once any of power, volume, mute or input is known
    pub fn has_reported(&self) -> bool {
        self.power.is_some()
            || self.volume_db.is_some()
            || self.muted.is_some()
            || self.active_input.is_some()
    }
}

/// Device-level information reported by the receiver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
    pub software_version: Option<String>,
    pub input_count: Option<u8>,
    /// Names reported through `ISN`, keyed by input index
    pub input_names: BTreeMap<u8, String>,
    pub standby_ip_control: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_zone_has_not_reported() {
        let state = ZoneState::unknown(2);
        assert_eq!(state.zone, 2);
        assert!(!state.has_reported());
        assert!(state.last_updated.is_none());
    }

    #[test]
    fn test_false_is_a_report() {
        let mut state = ZoneState::unknown(1);
        state.muted = Some(false);
        assert!(state.has_reported());
    }
}
