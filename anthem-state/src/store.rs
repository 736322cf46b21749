//! Per-device zone state store
//!
//! Holds the last known value of every attribute for each zone of one
//! receiver. Events are applied as they are decoded; only attributes whose
//! value actually differs are reported back as [`StateChange`]s.
//!
//! # Architecture
//!
//! ```text
//! ZoneStateStore
//! ├── zones: BTreeMap<u8, ZoneState>   (tracked zones pre-populated, others on first event)
//! ├── device: DeviceInfo
//! └── connected_at: Option<DateTime>   (start of the current responsiveness window)
//! ```

use std::collections::BTreeMap;

use anthem_protocol::{ResponseEvent, VOLUME_MAX_DB, VOLUME_MIN_DB};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::change::{DeviceAttribute, StateChange, ZoneAttribute};
use crate::model::{DeviceDescriptor, DeviceInfo, ZoneState};

/// Replaces `slot` with `value`, returning true if the value differed
fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        false
    } else {
        *slot = Some(value);
        true
    }
}

/// Thread-safe state of one receiver
pub struct ZoneStateStore {
    zone_count: u8,
    zones: RwLock<BTreeMap<u8, ZoneState>>,
    device: RwLock<DeviceInfo>,
    connected_at: RwLock<Option<DateTime<Utc>>>,
}

impl ZoneStateStore {
    /// Creates a store with every tracked zone in the unknown state
    pub fn new(descriptor: &DeviceDescriptor) -> Self {
        Self::with_zone_count(descriptor.zone_count())
    }

    pub fn with_zone_count(zone_count: u8) -> Self {
        let zones = (1..=zone_count)
            .map(|zone| (zone, ZoneState::unknown(zone)))
            .collect();

        Self {
            zone_count,
            zones: RwLock::new(zones),
            device: RwLock::new(DeviceInfo::default()),
            connected_at: RwLock::new(None),
        }
    }

    pub fn tracks_zone(&self, zone: u8) -> bool {
        (1..=self.zone_count).contains(&zone)
    }

    // ========================================================================
    // Applying events
    // ========================================================================

    /// Applies one decoded event and returns the attributes that changed
    ///
    /// Events for zones outside the configured set are stored too, but their
    /// changes carry `tracked: false`. Volume is clamped to the valid range.
    pub fn apply_event(&self, event: &ResponseEvent) -> Vec<StateChange> {
        match event {
            ResponseEvent::ZonePower(zone, on) => self.update_zone(*zone, |state| {
                replace(&mut state.power, *on)
                    .then(|| ZoneAttribute::Power(*on))
                    .into_iter()
                    .collect()
            }),
            ResponseEvent::ZoneVolume(zone, db) => {
                let db = (*db).clamp(VOLUME_MIN_DB, VOLUME_MAX_DB);
                self.update_zone(*zone, |state| {
                    replace(&mut state.volume_db, db)
                        .then(|| ZoneAttribute::VolumeDb(db))
                        .into_iter()
                        .collect()
                })
            }
            ResponseEvent::ZoneMute(zone, on) => self.update_zone(*zone, |state| {
                replace(&mut state.muted, *on)
                    .then(|| ZoneAttribute::Muted(*on))
                    .into_iter()
                    .collect()
            }),
            ResponseEvent::ZoneInput(zone, input) => {
                let known_name = self.device.read().input_names.get(input).cloned();
                self.update_zone(*zone, |state| {
                    let mut changes = Vec::new();
                    let switched = replace(&mut state.active_input, *input);
                    if switched {
                        changes.push(ZoneAttribute::Input(*input));
                    }
                    match known_name {
                        Some(name) => {
                            if replace(&mut state.input_name, name.clone()) {
                                changes.push(ZoneAttribute::InputName(name));
                            }
                        }
                        // The old name belongs to the previous input.
                        None if switched => state.input_name = None,
                        None => {}
                    }
                    changes
                })
            }
            ResponseEvent::ZoneInputName(zone, name) => self.update_zone(*zone, |state| {
                replace(&mut state.input_name, name.clone())
                    .then(|| ZoneAttribute::InputName(name.clone()))
                    .into_iter()
                    .collect()
            }),
            ResponseEvent::ZoneAudioFormat(zone, format) => self.update_zone(*zone, |state| {
                replace(&mut state.audio_format, format.clone())
                    .then(|| ZoneAttribute::AudioFormat(format.clone()))
                    .into_iter()
                    .collect()
            }),
            ResponseEvent::ZoneListeningMode(zone, mode) => self.update_zone(*zone, |state| {
                replace(&mut state.listening_mode, *mode)
                    .then(|| ZoneAttribute::ListeningMode(*mode))
                    .into_iter()
                    .collect()
            }),
            ResponseEvent::DeviceModel(model) => self.update_device(|info| {
                replace(&mut info.model, model.clone())
                    .then(|| DeviceAttribute::Model(model.clone()))
            }),
            ResponseEvent::DeviceName(name) => self.update_device(|info| {
                replace(&mut info.name, name.clone()).then(|| DeviceAttribute::Name(name.clone()))
            }),
            ResponseEvent::DeviceRegion(region) => self.update_device(|info| {
                replace(&mut info.region, region.clone())
                    .then(|| DeviceAttribute::Region(region.clone()))
            }),
            ResponseEvent::SoftwareVersion(version) => self.update_device(|info| {
                replace(&mut info.software_version, version.clone())
                    .then(|| DeviceAttribute::SoftwareVersion(version.clone()))
            }),
            ResponseEvent::InputCount(count) => self.update_device(|info| {
                replace(&mut info.input_count, *count).then(|| DeviceAttribute::InputCount(*count))
            }),
            ResponseEvent::InputName(index, name) => self.update_device(|info| {
                let previous = info.input_names.insert(*index, name.clone());
                (previous.as_ref() != Some(name))
                    .then(|| DeviceAttribute::InputName(*index, name.clone()))
            }),
            ResponseEvent::StandbyIpControl(on) => self.update_device(|info| {
                replace(&mut info.standby_ip_control, *on)
                    .then(|| DeviceAttribute::StandbyIpControl(*on))
            }),
            ResponseEvent::DeviceError(line) => {
                tracing::warn!("Receiver rejected a command: {}", line);
                Vec::new()
            }
            ResponseEvent::Unrecognized(_) => Vec::new(),
        }
    }

    fn update_zone<F>(&self, zone: u8, update: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ZoneState) -> Vec<ZoneAttribute>,
    {
        let tracked = self.tracks_zone(zone);
        let attributes = {
            let mut zones = self.zones.write();
            let state = zones
                .entry(zone)
                .or_insert_with(|| ZoneState::unknown(zone));
            state.last_updated = Some(Utc::now());
            update(state)
        };

        if !tracked && !attributes.is_empty() {
            tracing::trace!("Zone {} is not tracked, change stored silently", zone);
        }

        attributes
            .into_iter()
            .map(|attribute| StateChange::Zone {
                zone,
                tracked,
                attribute,
            })
            .collect()
    }

    fn update_device<F>(&self, update: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut DeviceInfo) -> Option<DeviceAttribute>,
    {
        let mut device = self.device.write();
        update(&mut device)
            .map(StateChange::Device)
            .into_iter()
            .collect()
    }

    // ========================================================================
    // Responsiveness
    // ========================================================================

    /// Starts a new responsiveness window (called on every successful connect)
    pub fn mark_connected(&self) {
        *self.connected_at.write() = Some(Utc::now());
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        *self.connected_at.read()
    }

    /// Tracked zones that have not produced an event since the last connect
    pub fn unresponsive_zones(&self) -> Vec<u8> {
        let Some(since) = self.connected_at() else {
            return Vec::new();
        };

        let zones = self.zones.read();
        (1..=self.zone_count)
            .filter(|zone| {
                zones
                    .get(zone)
                    .and_then(|state| state.last_updated)
                    .map_or(true, |updated| updated < since)
            })
            .collect()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of one zone (tracked or not)
    pub fn zone(&self, zone: u8) -> Option<ZoneState> {
        self.zones.read().get(&zone).cloned()
    }

    /// Snapshots of the tracked zones, ascending
    pub fn zones(&self) -> Vec<ZoneState> {
        self.zones
            .read()
            .values()
            .filter(|state| self.tracks_zone(state.zone))
            .cloned()
            .collect()
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.device.read().clone()
    }
}
