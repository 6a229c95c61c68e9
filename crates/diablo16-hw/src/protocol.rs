//! Diablo16 serial protocol definitions.
//!
//! Protocol structure:
//! - Every value on the wire is a 16-bit word, most significant byte first
//! - A request is an opcode word followed by its argument words
//! - The controller answers with a single ACK byte (0x06), then any response words

/// Acknowledgment byte sent by the controller after a successful command.
pub const ACK: u8 = 0x06;

/// Word substituted for a response word that never arrived.
pub const SENTINEL_WORD: u16 = 0xDEAD;

/// Command opcodes from the Diablo16 serial command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    /// Clear screen to the background colour (5.2.1).
    Clear = 0xFF82,
    /// Circle outline (5.2.3).
    DrawCircle = 0xFF78,
    /// Solid circle (5.2.4).
    DrawCircleFilled = 0xFF77,
    /// Line between two points (5.2.5).
    DrawLine = 0xFF7D,
    /// Rectangle outline (5.2.6).
    DrawRectangle = 0xFF7A,
    /// Solid rectangle (5.2.7).
    DrawRectangleFilled = 0xFF79,
    /// Open polyline (5.2.8).
    DrawPolyline = 0x0015,
    /// Closed polygon outline (5.2.9).
    DrawPolygon = 0x0013,
    /// Solid polygon (5.2.10).
    DrawPolygonFilled = 0x0014,
    /// Triangle outline (5.2.11).
    DrawTriangle = 0xFF74,
    /// Solid triangle (5.2.12).
    DrawTriangleFilled = 0xFF59,
    /// Move the graphics origin (5.2.16).
    MoveOrigin = 0xFF81,
    /// Outline colour for rectangles and circles (5.2.30).
    OutlineColor = 0xFF41,
    /// Display contrast, 0-15 (5.2.31).
    Contrast = 0xFF40,
    /// Line draw pattern (5.2.33).
    LinePattern = 0xFF3F,
    /// Graphics orientation (5.2.34).
    ScreenMode = 0xFF42,
    /// Transparency on/off (5.2.35).
    Transparency = 0xFF44,
    /// Colour treated as transparent (5.2.36).
    TransparentColor = 0xFF45,
    /// Generic graphics parameter (5.2.37).
    SetGraphicsParameters = 0xFF83,
    /// Initialise the uSD card (5.3.1).
    MediaInit = 0xFF25,
    /// Set media byte address (5.3.2).
    MediaSetByte = 0xFF2F,
    /// Draw raw image from media (5.3.11).
    MediaImageRaw = 0xFF27,
}

impl Opcode {
    /// Returns the opcode word as sent on the wire.
    pub fn word(self) -> u16 {
        self as u16
    }
}

/// Splits a word into its wire bytes, most significant first.
#[inline]
pub fn word_to_bytes(word: u16) -> [u8; 2] {
    word.to_be_bytes()
}

/// Joins two wire bytes, most significant first, into a word.
#[inline]
pub fn bytes_to_word(high: u8, low: u8) -> u16 {
    u16::from_be_bytes([high, low])
}
