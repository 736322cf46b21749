//! # Anthem SDK
//!
//! Zone-level control and live state for Anthem A/V receivers over the IP
//! control protocol.
//!
//! ```rust,ignore
//! use anthem_sdk::{load_device_configs, ClientConfig, ClientRegistry};
//!
//! let registry = ClientRegistry::new(ClientConfig::default())?;
//! registry
//!     .initialize_from_configuration(load_device_configs("devices.json")?)
//!     .await?;
//!
//! let mut changes = registry.subscribe_changes();
//! while let Ok(change) = changes.recv().await {
//!     println!("{}", change);
//! }
//! ```
//!
//! Commands never wait for the receiver: they are validated, written, and
//! the resulting state arrives through the change stream.

pub mod config;
mod dispatch;
pub mod device;
pub mod entity;
pub mod error;
pub mod notify;
pub mod registry;
pub mod volume;

pub use config::{default_config_path, load_device_configs, ClientConfig, DeviceConfig};
pub use device::DeviceClient;
pub use entity::EntityId;
pub use error::{Result, SdkError};
pub use notify::{ZoneAttributeChange, ZoneAvailability, ZoneChange};
pub use registry::ClientRegistry;
pub use volume::{db_to_percent, percent_to_db};

// Re-export the types hosts need without depending on the lower crates
pub use anthem_connection::{ConnectionConfig, ConnectionState};
pub use anthem_protocol::{ModelFamily, ZoneNumber};
pub use anthem_state::{logging, DeviceDescriptor, DeviceId, DeviceInfo, ZoneAttribute, ZoneState};
