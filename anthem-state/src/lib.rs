//! # Anthem State
//!
//! Last known state of Anthem receivers: a [`ZoneStateStore`] per device that
//! applies decoded [`ResponseEvent`](anthem_protocol::ResponseEvent)s and
//! reports which attributes changed.
//!
//! ```rust
//! use anthem_protocol::{ModelFamily, ResponseEvent};
//! use anthem_state::{DeviceDescriptor, ZoneStateStore};
//!
//! let descriptor =
//!     DeviceDescriptor::new("Den", "192.168.1.50", 14999, ModelFamily::Mrx, 1).unwrap();
//! let store = ZoneStateStore::new(&descriptor);
//!
//! let changes = store.apply_event(&ResponseEvent::ZoneVolume(1, -35));
//! assert_eq!(changes.len(), 1);
//! assert_eq!(store.zone(1).unwrap().volume_db, Some(-35));
//! ```

pub mod change;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

pub use change::{DeviceAttribute, StateChange, ZoneAttribute};
pub use error::{Result, StateError};
pub use model::{DeviceDescriptor, DeviceId, DeviceInfo, ZoneState};
pub use store::ZoneStateStore;
