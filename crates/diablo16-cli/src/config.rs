//! Configuration management.

use anyhow::{Context, Result};
use diablo16_hw::{LinkConfig, TimeoutPolicy, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Wait for every drawing command's ACK inline
    #[serde(default)]
    pub blocking: bool,

    /// Serial port configuration
    #[serde(default)]
    pub serial: SerialConfig,

    /// ACK wait timing
    #[serde(default = "default_ack")]
    pub ack: TimingConfig,

    /// Response word wait timing
    #[serde(default = "default_response")]
    pub response: TimingConfig,
}

/// Serial port configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
        }
    }
}

/// Timing for one kind of wait, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between "still waiting" warnings
    pub poll_interval_ms: u64,

    /// Hard deadline for the wait
    pub give_up_after_ms: u64,
}

impl From<TimeoutPolicy> for TimingConfig {
    fn from(policy: TimeoutPolicy) -> Self {
        Self {
            poll_interval_ms: policy.poll_interval.as_millis() as u64,
            give_up_after_ms: policy.give_up_after.as_millis() as u64,
        }
    }
}

impl From<TimingConfig> for TimeoutPolicy {
    fn from(timing: TimingConfig) -> Self {
        TimeoutPolicy::from_millis(timing.poll_interval_ms, timing.give_up_after_ms)
    }
}

// Default value functions
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_ack() -> TimingConfig {
    TimeoutPolicy::ack_default().into()
}

fn default_response() -> TimingConfig {
    TimeoutPolicy::response_default().into()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Timeouts for the dispatcher.
    pub fn link(&self) -> LinkConfig {
        LinkConfig {
            ack: self.ack.into(),
            response: self.response.into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocking: false,
            serial: SerialConfig::default(),
            ack: default_ack(),
            response: default_response(),
        }
    }
}
