//! # Anthem Protocol
//!
//! Pure encode/decode for the Anthem A/V receiver IP control protocol. No I/O,
//! no state beyond the partial-line buffer of [`LineDecoder`].
//!
//! ```rust
//! use anthem_protocol::{parse_response, Command, LineDecoder, ResponseEvent, ZoneNumber};
//!
//! let line = Command::SetVolume { zone: ZoneNumber::MAIN, db: -40 }.to_line().unwrap();
//! assert_eq!(line, "Z1VOL-40\r");
//!
//! let mut decoder = LineDecoder::new();
//! let events: Vec<ResponseEvent> = decoder
//!     .feed(b"Z1POW1\rZ1VOL-40\r")
//!     .iter()
//!     .map(|line| parse_response(line))
//!     .collect();
//! assert_eq!(
//!     events,
//!     vec![ResponseEvent::ZonePower(1, true), ResponseEvent::ZoneVolume(1, -40)]
//! );
//! ```
//!
//! ## Wire format
//!
//! ```text
//! outbound   Z{zone}{code}{value}\r   |   {code}{value}\r
//! inbound    same shape, terminated by \r, \n or ;
//! ```

pub mod command;
pub mod error;
pub mod framing;
pub mod model;
pub mod response;
pub mod zone;

pub use command::{
    encode, Command, CommandCode, CommandValue, COMMAND_TERMINATOR, VOLUME_MAX_DB, VOLUME_MIN_DB,
};
pub use error::{ProtocolError, Result};
pub use framing::{decode, LineDecoder, DEFAULT_MAX_LINE_LENGTH};
pub use model::ModelFamily;
pub use response::{
    listening_mode_by_name, listening_mode_count, listening_mode_name, parse_response,
    ResponseEvent,
};
pub use zone::ZoneNumber;

/// Default TCP port of the IP control interface
pub const DEFAULT_PORT: u16 = 14999;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::command::{Command, CommandCode};
    pub use crate::framing::LineDecoder;
    pub use crate::model::ModelFamily;
    pub use crate::response::{parse_response, ResponseEvent};
    pub use crate::zone::ZoneNumber;
}
