//! Error types for the Diablo16 serial library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with the hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial device path does not exist.
    #[error("Serial port not found at {0}")]
    PortNotFound(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial I/O error.
    #[error("Serial I/O error: {0}")]
    SerialIo(#[from] std::io::Error),

    /// Invalid screen mode value.
    #[error("Invalid screen mode: {0}")]
    InvalidScreenMode(String),

    /// Invalid colour string.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Vertex list that cannot be split into x and y halves.
    #[error("Invalid vertex list: {0}")]
    InvalidVertices(String),
}

/// Faults on the command link.
///
/// These never surface as `Err` from the dispatcher. They are logged, recorded
/// as the dispatcher's last fault, and the command yields its default value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkFault {
    /// No acknowledgment byte arrived before the give-up deadline.
    #[error("timed out waiting for ACK of {command}")]
    AckTimeout { command: &'static str },

    /// A byte arrived but it was not ACK.
    #[error("failed ACK for {command}: {value} (0x{value:02X})")]
    AckFailed { command: &'static str, value: u8 },

    /// Fewer response words than expected arrived before the deadline.
    #[error("response to {command} timed out ({missing} of {expected} words missing)")]
    ResponseTimeout {
        command: &'static str,
        expected: u16,
        missing: u16,
    },

    /// Words of a deferred response were drained because a newer command
    /// needed the link.
    #[error("discarded {words} stale response words from {command}")]
    StaleResponseDiscarded { command: &'static str, words: u16 },
}
