//! Response classification
//!
//! Any decoded line may be an unsolicited push or a late reply to an earlier
//! query; the protocol carries no correlation. Classification is therefore
//! purely prefix-driven and stateless.

use crate::error::{ProtocolError, Result};

/// Audio listening modes reported by `ALM`
const LISTENING_MODES: [&str; 16] = [
    "None",
    "AnthemLogic Cinema",
    "AnthemLogic Music",
    "Dolby Surround",
    "DTS Neural:X",
    "Stereo",
    "Multi-Channel Stereo",
    "All-Channel Stereo",
    "PLIIx Movie",
    "PLIIx Music",
    "Neo:6 Cinema",
    "Neo:6 Music",
    "Dolby Digital",
    "DTS",
    "PCM Stereo",
    "Direct",
];

/// Name of a listening mode number, if known
pub fn listening_mode_name(mode: u8) -> Option<&'static str> {
    LISTENING_MODES.get(usize::from(mode)).copied()
}

/// Mode number for a name, ignoring ASCII case
pub fn listening_mode_by_name(name: &str) -> Option<u8> {
    let name = name.trim();
    LISTENING_MODES
        .iter()
        .position(|mode| mode.eq_ignore_ascii_case(name))
        .and_then(|index| u8::try_from(index).ok())
}

/// Number of listening modes the receiver accepts (`0..count`)
pub fn listening_mode_count() -> u8 {
    LISTENING_MODES.len() as u8
}

/// A classified inbound line
///
/// Zone numbers are kept raw: receivers report zones the client may not track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    ZonePower(u8, bool),
    ZoneVolume(u8, i32),
    ZoneMute(u8, bool),
    ZoneInput(u8, u8),
    ZoneInputName(u8, String),
    ZoneAudioFormat(u8, String),
    ZoneListeningMode(u8, u8),
    DeviceModel(String),
    DeviceName(String),
    DeviceRegion(String),
    SoftwareVersion(String),
    InputCount(u8),
    InputName(u8, String),
    StandbyIpControl(bool),
    /// `!I` (invalid command) or `!E` (execution failed)
    DeviceError(String),
    Unrecognized(String),
}

impl ResponseEvent {
    /// Zone the event refers to, for zone-level events
    pub fn zone(&self) -> Option<u8> {
        match self {
            ResponseEvent::ZonePower(zone, _)
            | ResponseEvent::ZoneVolume(zone, _)
            | ResponseEvent::ZoneMute(zone, _)
            | ResponseEvent::ZoneInput(zone, _)
            | ResponseEvent::ZoneInputName(zone, _)
            | ResponseEvent::ZoneAudioFormat(zone, _)
            | ResponseEvent::ZoneListeningMode(zone, _) => Some(*zone),
            _ => None,
        }
    }
}

/// Classifies a single decoded line
///
/// Never fails: a line that cannot be decoded becomes
/// [`ResponseEvent::Unrecognized`] so one bad line cannot stop the read loop.
pub fn parse_response(line: &str) -> ResponseEvent {
    let line = line.trim();

    match try_parse(line) {
        Ok(event) => event,
        Err(error) => {
            tracing::debug!("{}", error);
            ResponseEvent::Unrecognized(line.to_string())
        }
    }
}

fn try_parse(line: &str) -> Result<ResponseEvent> {
    if line.starts_with("!I") || line.starts_with("!E") {
        return Ok(ResponseEvent::DeviceError(line.to_string()));
    }

    match line.strip_prefix('Z') {
        Some(rest) => parse_zone_line(line, rest),
        None => parse_device_line(line),
    }
}

fn split_code<'a>(line: &str, payload: &'a str) -> Result<(&'a str, &'a str)> {
    let code = payload
        .get(..3)
        .ok_or_else(|| ProtocolError::decode(line, "missing command code"))?;
    let value = payload
        .get(3..)
        .ok_or_else(|| ProtocolError::decode(line, "missing command code"))?;

    if value == "?" {
        return Err(ProtocolError::decode(line, "query echo"));
    }

    Ok((code, value))
}

fn parse_zone_line(line: &str, rest: &str) -> Result<ResponseEvent> {
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let zone: u8 = rest[..digits]
        .parse()
        .map_err(|_| ProtocolError::decode(line, "invalid zone number"))?;

    let (code, value) = split_code(line, &rest[digits..])?;

    match code {
        "POW" => Ok(ResponseEvent::ZonePower(zone, parse_flag(line, value)?)),
        "VOL" => Ok(ResponseEvent::ZoneVolume(zone, parse_volume(line, value)?)),
        "MUT" => Ok(ResponseEvent::ZoneMute(zone, parse_flag(line, value)?)),
        "INP" => Ok(ResponseEvent::ZoneInput(zone, parse_index(line, value)?)),
        "SIP" => Ok(ResponseEvent::ZoneInputName(zone, parse_text(line, value)?)),
        "AIC" => Ok(ResponseEvent::ZoneAudioFormat(zone, parse_text(line, value)?)),
        "ALM" => Ok(ResponseEvent::ZoneListeningMode(zone, parse_index(line, value)?)),
        _ => Err(ProtocolError::decode(line, "unknown zone command")),
    }
}

fn parse_device_line(line: &str) -> Result<ResponseEvent> {
    let (code, value) = split_code(line, line)?;

    match code {
        "IDM" => Ok(ResponseEvent::DeviceModel(parse_text(line, value)?)),
        "IDN" => Ok(ResponseEvent::DeviceName(parse_text(line, value)?)),
        "IDR" => Ok(ResponseEvent::DeviceRegion(parse_text(line, value)?)),
        "IDS" => Ok(ResponseEvent::SoftwareVersion(parse_text(line, value)?)),
        "ICN" => Ok(ResponseEvent::InputCount(parse_index(line, value)?)),
        "ISN" => {
            let index = value
                .get(..2)
                .ok_or_else(|| ProtocolError::decode(line, "missing input index"))?;
            let index = parse_index(line, index)?;
            let name = value.get(2..).unwrap_or_default();
            if name == "?" {
                return Err(ProtocolError::decode(line, "query echo"));
            }
            Ok(ResponseEvent::InputName(index, parse_text(line, name)?))
        }
        "SIP" => Ok(ResponseEvent::StandbyIpControl(parse_flag(line, value)?)),
        _ => Err(ProtocolError::decode(line, "unknown command")),
    }
}

fn parse_flag(line: &str, value: &str) -> Result<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ProtocolError::decode(line, "expected 0 or 1")),
    }
}

fn parse_volume(line: &str, value: &str) -> Result<i32> {
    // Some firmware reports half-dB steps ("-35.5"); truncate toward zero.
    let integral = match value.split_once('.') {
        Some((integral, fraction))
            if !fraction.is_empty() && fraction.chars().all(|c| c.is_ascii_digit()) =>
        {
            integral
        }
        Some(_) => return Err(ProtocolError::decode(line, "volume is not numeric")),
        None => value,
    };

    integral
        .parse::<i32>()
        .map_err(|_| ProtocolError::decode(line, "volume is not numeric"))
}

fn parse_index(line: &str, value: &str) -> Result<u8> {
    value
        .parse::<u8>()
        .map_err(|_| ProtocolError::decode(line, "expected an index"))
}

fn parse_text(line: &str, value: &str) -> Result<String> {
    let text = value.trim().trim_matches('"').trim();
    if text.is_empty() {
        Err(ProtocolError::decode(line, "empty value"))
    } else {
        Ok(text.to_string())
    }
}
