//! Attribute-level change records produced by the store

use std::fmt;

/// A zone attribute together with its new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneAttribute {
    Power(bool),
    VolumeDb(i32),
    Muted(bool),
    Input(u8),
    InputName(String),
    AudioFormat(String),
    ListeningMode(u8),
}

impl ZoneAttribute {
    /// Stable attribute key, e.g. for log fields
    pub fn key(&self) -> &'static str {
        match self {
            ZoneAttribute::Power(_) => "power",
            ZoneAttribute::VolumeDb(_) => "volume_db",
            ZoneAttribute::Muted(_) => "muted",
            ZoneAttribute::Input(_) => "active_input",
            ZoneAttribute::InputName(_) => "input_name",
            ZoneAttribute::AudioFormat(_) => "audio_format",
            ZoneAttribute::ListeningMode(_) => "listening_mode",
        }
    }
}

impl fmt::Display for ZoneAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneAttribute::Power(on) => write!(f, "power={}", on),
            ZoneAttribute::VolumeDb(db) => write!(f, "volume={}dB", db),
            ZoneAttribute::Muted(on) => write!(f, "muted={}", on),
            ZoneAttribute::Input(input) => write!(f, "input={}", input),
            ZoneAttribute::InputName(name) => write!(f, "input_name={}", name),
            ZoneAttribute::AudioFormat(format) => write!(f, "audio_format={}", format),
            ZoneAttribute::ListeningMode(mode) => write!(f, "listening_mode={}", mode),
        }
    }
}

/// A device-level attribute together with its new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAttribute {
    Model(String),
    Name(String),
    Region(String),
    SoftwareVersion(String),
    InputCount(u8),
    InputName(u8, String),
    StandbyIpControl(bool),
}

/// One attribute that actually changed while applying an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Zone {
        zone: u8,
        /// Whether the zone is part of the configured set
        tracked: bool,
        attribute: ZoneAttribute,
    },
    Device(DeviceAttribute),
}

impl StateChange {
    /// Only tracked zone changes and device changes are surfaced to the host
    pub fn is_notifiable(&self) -> bool {
        match self {
            StateChange::Zone { tracked, .. } => *tracked,
            StateChange::Device(_) => true,
        }
    }
}
