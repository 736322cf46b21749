//! Static configuration of one receiver

use anthem_protocol::{ModelFamily, ZoneNumber};
use serde::Serialize;

use super::DeviceId;
use crate::error::{Result, StateError};

/// Validated description of a configured receiver
///
/// Built once from configuration and never mutated. The zone count is checked
/// against the model family so the tracked zones are always `1..=zone_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    id: DeviceId,
    name: String,
    host: String,
    port: u16,
    model_family: ModelFamily,
    zone_count: u8,
}

impl DeviceDescriptor {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        model_family: ModelFamily,
        zone_count: u8,
    ) -> Result<Self> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(StateError::EmptyHost);
        }
        if port == 0 {
            return Err(StateError::InvalidPort);
        }

        let max = model_family.max_zones().min(ZoneNumber::MAX);
        if zone_count == 0 || zone_count > max {
            return Err(StateError::InvalidZoneCount {
                count: zone_count,
                family: model_family,
                max,
            });
        }

        let mut name = name.into();
        if name.trim().is_empty() {
            name = format!("Anthem {}", model_family);
        }

        Ok(Self {
            id: DeviceId::from_address(&host, port),
            name,
            host,
            port,
            model_family,
            zone_count,
        })
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn model_family(&self) -> ModelFamily {
        self.model_family
    }

    pub fn zone_count(&self) -> u8 {
        self.zone_count
    }

    /// `host:port`, suitable for `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tracked zones in ascending order
    pub fn zones(&self) -> Vec<ZoneNumber> {
        ZoneNumber::up_to(self.zone_count).collect()
    }

    pub fn tracks_zone(&self, zone: u8) -> bool {
        (1..=self.zone_count).contains(&zone)
    }
}
