//! RGB565 colour helpers.
//!
//! All colour arguments of the command set are 16-bit RGB565 words.

use crate::{Error, Result};

/// Converts RGB888 to RGB565.
#[inline]
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r >> 3) as u16;
    let g6 = (g >> 2) as u16;
    let b5 = (b >> 3) as u16;
    (r5 << 11) | (g6 << 5) | b5
}

/// Parses a `#RRGGBB` hex string to RGB565.
pub fn parse_hex_color(hex: &str) -> Result<u16> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(Error::InvalidColor(hex.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| Error::InvalidColor(hex.to_string()))
    };
    Ok(rgb888_to_rgb565(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
