//! Receiver model families
//!
//! The family decides how many zones can be configured and which input labels
//! are offered before the receiver reports its own input names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Default input labels for MRX and AVM receivers, indexed from 1
const HDMI_RECEIVER_INPUTS: [&str; 15] = [
    "HDMI 1",
    "HDMI 2",
    "HDMI 3",
    "HDMI 4",
    "HDMI 5",
    "HDMI 6",
    "HDMI 7",
    "HDMI 8",
    "Analog 1",
    "Analog 2",
    "Digital 1",
    "Digital 2",
    "USB",
    "Network",
    "ARC",
];

/// Default input labels for STR amplifiers and preamplifiers, indexed from 1
const STEREO_INPUTS: [&str; 10] = [
    "Analog 1",
    "Analog 2",
    "Analog 3",
    "Balanced",
    "Phono",
    "Coax 1",
    "Coax 2",
    "Optical 1",
    "Optical 2",
    "USB Audio",
];

/// Anthem product family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelFamily {
    /// MRX A/V receivers
    #[default]
    Mrx,
    /// AVM A/V processors
    Avm,
    /// STR stereo amplifiers and preamplifiers
    Str,
}

impl ModelFamily {
    /// Number of zones the family can drive
    pub fn max_zones(self) -> u8 {
        match self {
            ModelFamily::Mrx | ModelFamily::Avm => 3,
            ModelFamily::Str => 1,
        }
    }

    /// Input labels, position `i` is input index `i + 1`
    pub fn default_inputs(self) -> &'static [&'static str] {
        match self {
            ModelFamily::Mrx | ModelFamily::Avm => &HDMI_RECEIVER_INPUTS,
            ModelFamily::Str => &STEREO_INPUTS,
        }
    }

    /// Guesses the family from an `IDM` model string such as `MRX 720`
    pub fn from_model_name(model: &str) -> Option<Self> {
        let model = model.trim().to_ascii_uppercase();
        if model.starts_with("MRX") {
            Some(ModelFamily::Mrx)
        } else if model.starts_with("AVM") {
            Some(ModelFamily::Avm)
        } else if model.starts_with("STR") {
            Some(ModelFamily::Str)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::Mrx => "MRX",
            ModelFamily::Avm => "AVM",
            ModelFamily::Str => "STR",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MRX" => Ok(ModelFamily::Mrx),
            "AVM" => Ok(ModelFamily::Avm),
            "STR" => Ok(ModelFamily::Str),
            _ => Err(ProtocolError::UnknownModelFamily(s.to_string())),
        }
    }
}
