//! Client tuning and the device list supplied by the host
//!
//! The device list is read-only input: it is loaded at startup (and again on
//! reload) but never written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anthem_connection::ConnectionConfig;
use anthem_protocol::{ModelFamily, DEFAULT_PORT};
use anthem_state::{DeviceDescriptor, DeviceId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Tuning shared by every device client in a registry
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,

    /// How long a tracked zone may stay silent after a connect before it is
    /// reported as not responding
    /// Default: 5 seconds
    pub resync_timeout: Duration,

    /// Capacity of the change broadcast; slow subscribers lose the oldest entries
    /// Default: 256
    pub change_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            resync_timeout: Duration::from_secs(5),
            change_buffer: 256,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        if self.resync_timeout.is_zero() {
            return Err(SdkError::Configuration(
                "Resync timeout must be greater than 0".to_string(),
            ));
        }
        if self.change_buffer == 0 {
            return Err(SdkError::Configuration(
                "Change buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_resync_timeout(mut self, timeout: Duration) -> Self {
        self.resync_timeout = timeout;
        self
    }

    pub fn with_change_buffer(mut self, size: usize) -> Self {
        self.change_buffer = size;
        self
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_zone_count() -> u8 {
    1
}

/// One configured receiver as stored by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model_family: ModelFamily,
    #[serde(default = "default_zone_count")]
    pub zone_count: u8,
}

impl DeviceConfig {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: DEFAULT_PORT,
            name: String::new(),
            model_family: ModelFamily::default(),
            zone_count: 1,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        DeviceId::from_address(&self.ip, self.port)
    }

    pub fn to_descriptor(&self) -> Result<DeviceDescriptor> {
        Ok(DeviceDescriptor::new(
            self.name.clone(),
            self.ip.clone(),
            self.port,
            self.model_family,
            self.zone_count,
        )?)
    }
}

/// Reads a JSON array of [`DeviceConfig`] records
pub fn load_device_configs(path: impl AsRef<Path>) -> Result<Vec<DeviceConfig>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let configs = serde_json::from_str(&contents)?;
    Ok(configs)
}

/// `<config dir>/anthem/devices.json`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("anthem").join("devices.json"))
}
