//! Diablo16 Serial Display Library
//!
//! Drives a 4D Systems Diablo16 graphics controller over its serial command
//! set. Commands are pipelined: an acknowledgment can be deferred until just
//! before the next command is written, and the dispatcher keeps the byte
//! stream framed no matter which calls chose to defer.

pub mod color;
pub mod command;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod screen_mode;
pub mod transport;

pub use color::{parse_hex_color, rgb888_to_rgb565};
pub use command::{poly_points, Command};
pub use dispatcher::Dispatcher;
pub use display::{Display, DEFAULT_MEDIA_RETRIES};
pub use error::{Error, LinkFault, Result};
pub use poller::{LinkConfig, TimeoutPolicy};
pub use protocol::{Opcode, ACK, SENTINEL_WORD};
pub use screen_mode::ScreenMode;
pub use transport::{SerialTransport, Transport};

/// Factory default baud rate of the controller's serial port.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
