//! Outbound command encoding
//!
//! Every command is a single ASCII line terminated by a carriage return:
//!
//! ```text
//! Z{zone}{code}{value}\r    zone-level command, e.g. Z1VOL-40
//! {code}{value}\r           device-level command, e.g. IDM?
//! ```
//!
//! A trailing `?` in place of the value asks the receiver for the current value.

use std::fmt;

use crate::error::{ProtocolError, Result};
use crate::response::listening_mode_name;
use crate::zone::ZoneNumber;

/// Line terminator appended to every outbound command
pub const COMMAND_TERMINATOR: char = '\r';

/// Prefix for zone-level commands
pub const ZONE_PREFIX: char = 'Z';

/// Lowest volume the receiver accepts, in dB
pub const VOLUME_MIN_DB: i32 = -90;

/// Highest volume the receiver accepts, in dB
pub const VOLUME_MAX_DB: i32 = 0;

/// Command codes understood by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// `POW` - zone power, value `0`/`1`
    Power,
    /// `VOL` - absolute volume in dB
    Volume,
    /// `VUP` - one volume step up
    VolumeUp,
    /// `VDN` - one volume step down
    VolumeDown,
    /// `MUT` - mute, value `0`/`1`
    Mute,
    /// `INP` - input selection by index
    Input,
    /// `SIP` (zone-level) - name of the selected input
    InputName,
    /// `AIC` - incoming audio codec
    AudioFormat,
    /// `ALM` - audio listening mode
    ListeningMode,
    /// `AUP` - next listening mode
    ListeningModeUp,
    /// `ADN` - previous listening mode
    ListeningModeDown,
    /// `ECH` - command echo on/off
    Echo,
    /// `SIP` (device-level) - keep IP control active in standby
    StandbyIpControl,
    /// `IDM` - model
    Model,
    /// `IDN` - device name
    Name,
    /// `IDR` - region
    Region,
    /// `IDS` - software version
    SoftwareVersion,
    /// `ICN` - number of configured inputs
    InputCount,
    /// `ISN` - short name of an input, addressed by two-digit index
    InputShortName,
}

impl CommandCode {
    /// Three-letter code as it appears on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            CommandCode::Power => "POW",
            CommandCode::Volume => "VOL",
            CommandCode::VolumeUp => "VUP",
            CommandCode::VolumeDown => "VDN",
            CommandCode::Mute => "MUT",
            CommandCode::Input => "INP",
            CommandCode::InputName => "SIP",
            CommandCode::AudioFormat => "AIC",
            CommandCode::ListeningMode => "ALM",
            CommandCode::ListeningModeUp => "AUP",
            CommandCode::ListeningModeDown => "ADN",
            CommandCode::Echo => "ECH",
            CommandCode::StandbyIpControl => "SIP",
            CommandCode::Model => "IDM",
            CommandCode::Name => "IDN",
            CommandCode::Region => "IDR",
            CommandCode::SoftwareVersion => "IDS",
            CommandCode::InputCount => "ICN",
            CommandCode::InputShortName => "ISN",
        }
    }

    /// Whether the command is addressed to a zone (`Z{n}` prefix)
    pub fn is_zone_command(self) -> bool {
        matches!(
            self,
            CommandCode::Power
                | CommandCode::Volume
                | CommandCode::VolumeUp
                | CommandCode::VolumeDown
                | CommandCode::Mute
                | CommandCode::Input
                | CommandCode::InputName
                | CommandCode::AudioFormat
                | CommandCode::ListeningMode
                | CommandCode::ListeningModeUp
                | CommandCode::ListeningModeDown
        )
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value segment of an outbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    /// No value (relative commands such as `VUP`)
    None,
    /// Literal `?`, requests the current value
    Query,
    /// `0` or `1`
    Bool(bool),
    /// Signed base-10 integer
    Int(i32),
    /// Two-digit zero-padded index followed by `?` (input name queries)
    IndexQuery(u8),
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandValue::None => Ok(()),
            CommandValue::Query => f.write_str("?"),
            CommandValue::Bool(on) => f.write_str(if *on { "1" } else { "0" }),
            CommandValue::Int(value) => write!(f, "{}", value),
            CommandValue::IndexQuery(index) => write!(f, "{:02}?", index),
        }
    }
}

/// Encodes a single command line, terminator included
///
/// Zone-level codes require a zone, device-level codes must not carry one.
pub fn encode(zone: Option<ZoneNumber>, code: CommandCode, value: &CommandValue) -> Result<String> {
    let mut line = String::with_capacity(12);

    match (zone, code.is_zone_command()) {
        (Some(zone), true) => {
            line.push(ZONE_PREFIX);
            line.push_str(&zone.to_string());
        }
        (None, false) => {}
        (None, true) => return Err(ProtocolError::MissingZone(code.as_str())),
        (Some(_), false) => return Err(ProtocolError::UnexpectedZone(code.as_str())),
    }

    line.push_str(code.as_str());
    line.push_str(&value.to_string());
    line.push(COMMAND_TERMINATOR);
    Ok(line)
}

/// Typed commands sent to a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Power { zone: ZoneNumber, on: bool },
    SetVolume { zone: ZoneNumber, db: i32 },
    VolumeUp { zone: ZoneNumber },
    VolumeDown { zone: ZoneNumber },
    Mute { zone: ZoneNumber, on: bool },
    SelectInput { zone: ZoneNumber, input: u8 },
    SetListeningMode { zone: ZoneNumber, mode: u8 },
    ListeningModeUp { zone: ZoneNumber },
    ListeningModeDown { zone: ZoneNumber },
    /// Zone-level query, e.g. `Z1POW?`
    Query { zone: ZoneNumber, code: CommandCode },
    /// Device-level query, e.g. `IDM?`
    DeviceQuery(CommandCode),
    /// `ISNyy?`
    QueryInputName(u8),
    Echo(bool),
    StandbyIpControl(bool),
}

impl Command {
    /// Encodes the command into its wire line
    pub fn to_line(&self) -> Result<String> {
        match self {
            Command::Power { zone, on } => {
                encode(Some(*zone), CommandCode::Power, &CommandValue::Bool(*on))
            }
            Command::SetVolume { zone, db } => {
                if !(VOLUME_MIN_DB..=VOLUME_MAX_DB).contains(db) {
                    return Err(ProtocolError::ValueOutOfRange {
                        code: CommandCode::Volume.as_str(),
                        value: *db,
                    });
                }
                encode(Some(*zone), CommandCode::Volume, &CommandValue::Int(*db))
            }
            Command::VolumeUp { zone } => {
                encode(Some(*zone), CommandCode::VolumeUp, &CommandValue::None)
            }
            Command::VolumeDown { zone } => {
                encode(Some(*zone), CommandCode::VolumeDown, &CommandValue::None)
            }
            Command::Mute { zone, on } => {
                encode(Some(*zone), CommandCode::Mute, &CommandValue::Bool(*on))
            }
            Command::SelectInput { zone, input } => {
                if *input == 0 {
                    return Err(ProtocolError::ValueOutOfRange {
                        code: CommandCode::Input.as_str(),
                        value: 0,
                    });
                }
                encode(
                    Some(*zone),
                    CommandCode::Input,
                    &CommandValue::Int(i32::from(*input)),
                )
            }
            Command::SetListeningMode { zone, mode } => {
                if listening_mode_name(*mode).is_none() {
                    return Err(ProtocolError::ValueOutOfRange {
                        code: CommandCode::ListeningMode.as_str(),
                        value: i32::from(*mode),
                    });
                }
                encode(
                    Some(*zone),
                    CommandCode::ListeningMode,
                    &CommandValue::Int(i32::from(*mode)),
                )
            }
            Command::ListeningModeUp { zone } => {
                encode(Some(*zone), CommandCode::ListeningModeUp, &CommandValue::None)
            }
            Command::ListeningModeDown { zone } => {
                encode(Some(*zone), CommandCode::ListeningModeDown, &CommandValue::None)
            }
            Command::Query { zone, code } => encode(Some(*zone), *code, &CommandValue::Query),
            Command::DeviceQuery(code) => encode(None, *code, &CommandValue::Query),
            Command::QueryInputName(input) => {
                if *input == 0 || *input > 99 {
                    return Err(ProtocolError::ValueOutOfRange {
                        code: CommandCode::InputShortName.as_str(),
                        value: i32::from(*input),
                    });
                }
                encode(
                    None,
                    CommandCode::InputShortName,
                    &CommandValue::IndexQuery(*input),
                )
            }
            Command::Echo(on) => encode(None, CommandCode::Echo, &CommandValue::Bool(*on)),
            Command::StandbyIpControl(on) => {
                encode(None, CommandCode::StandbyIpControl, &CommandValue::Bool(*on))
            }
        }
    }

    /// Per-zone queries that refresh every tracked attribute
    pub fn zone_queries(zone: ZoneNumber) -> [Command; 4] {
        [
            Command::Query { zone, code: CommandCode::Power },
            Command::Query { zone, code: CommandCode::Volume },
            Command::Query { zone, code: CommandCode::Mute },
            Command::Query { zone, code: CommandCode::Input },
        ]
    }
}
