//! Data model for receivers and their zones

pub mod descriptor;
pub mod device_id;
pub mod zone_state;

pub use descriptor::DeviceDescriptor;
pub use device_id::DeviceId;
pub use zone_state::{DeviceInfo, ZoneState};
