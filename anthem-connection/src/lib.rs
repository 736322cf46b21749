//! # Anthem Connection
//!
//! One persistent TCP session per receiver. The [`ConnectionManager`]
//! connects in the background, writes a full-state query burst after every
//! connect, forwards every decoded line to a [`ResponseHandler`], and keeps
//! reconnecting with exponential backoff until it is told to disconnect.
//!
//! ```rust,ignore
//! let manager = ConnectionManager::new("192.168.1.100:14999", 2, ConnectionConfig::default(), handler)?;
//! manager.start();
//! manager.send(&Command::Power { zone: ZoneNumber::MAIN, on: true }).await?;
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod handler;
pub mod manager;
pub mod resync;
pub mod state;

pub use backoff::Backoff;
pub use config::ConnectionConfig;
pub use error::{ConnectionError, Result};
pub use handler::ResponseHandler;
pub use manager::ConnectionManager;
pub use resync::ResyncPlan;
pub use state::ConnectionState;
