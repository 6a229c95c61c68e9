//! Graphics orientation.
//!
//! The controller rotates its own coordinate system; the screen mode command
//! takes one of four values and answers with the previous one.

use crate::{Error, Result};
use std::str::FromStr;

/// Screen orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum ScreenMode {
    /// Landscape, controller native.
    #[default]
    Landscape = 0,
    /// Landscape rotated 180°.
    LandscapeReverse = 1,
    /// Portrait.
    Portrait = 2,
    /// Portrait rotated 180°.
    PortraitReverse = 3,
}

impl ScreenMode {
    /// Returns the argument word for the screen mode command.
    pub fn word(&self) -> u16 {
        *self as u16
    }

    /// Converts a word reported by the controller.
    pub fn from_word(value: u16) -> Result<Self> {
        match value {
            0 => Ok(ScreenMode::Landscape),
            1 => Ok(ScreenMode::LandscapeReverse),
            2 => Ok(ScreenMode::Portrait),
            3 => Ok(ScreenMode::PortraitReverse),
            _ => Err(Error::InvalidScreenMode(format!("0x{:04X}", value))),
        }
    }
}

impl FromStr for ScreenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "landscape" => Ok(ScreenMode::Landscape),
            "landscape-reverse" | "landscape_reverse" => Ok(ScreenMode::LandscapeReverse),
            "portrait" => Ok(ScreenMode::Portrait),
            "portrait-reverse" | "portrait_reverse" => Ok(ScreenMode::PortraitReverse),
            _ => Err(Error::InvalidScreenMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for ScreenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenMode::Landscape => write!(f, "landscape"),
            ScreenMode::LandscapeReverse => write!(f, "landscape-reverse"),
            ScreenMode::Portrait => write!(f, "portrait"),
            ScreenMode::PortraitReverse => write!(f, "portrait-reverse"),
        }
    }
}
