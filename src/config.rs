// Tick period, pulse bounds, ramp rate, servo controller settings
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motor::maestro::{DEFAULT_BAUDRATE, MAX_PULSE_US};
use crate::motor::PulseRange;

// Control loop period
pub const TICK_MS: u64 = 20;

// Pulse width boundaries (microseconds)
pub const PULSE_NEUTRAL: u16 = 1500;
pub const PULSE_FORWARD: u16 = 1750;
pub const PULSE_REVERSE: u16 = 1250;

// Microseconds per tick (smaller = smoother)
pub const RAMP_STEP: u16 = 10;

// Servo controller channels driving the Sabertooth S1/S2 inputs
pub const LEFT_CHANNEL: u8 = 0;
pub const RIGHT_CHANNEL: u8 = 1;

// Serial command port of the servo controller
pub const MOTOR_PORT: &str = "/dev/ttyACM0";
pub const MOTOR_BAUD: u32 = DEFAULT_BAUDRATE;

/// Error types for loading a drive configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Pulse bounds must satisfy reverse < neutral < forward, got {reverse}/{neutral}/{forward}")]
    UnorderedPulses {
        reverse: u16,
        neutral: u16,
        forward: u16,
    },

    #[error("Pulse bounds must be symmetric around neutral {neutral}: reverse is {below}us below, forward is {above}us above")]
    AsymmetricPulses { neutral: u16, below: u16, above: u16 },

    #[error("Forward pulse {forward}us exceeds the servo controller limit of {max}us")]
    PulseTooWide { forward: u16, max: u16 },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("Left and right wheels share servo channel {channel}")]
    SharedChannel { channel: u8 },
}

/// Everything the controller needs; any field may be omitted in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveConfig {
    pub pulse: PulseRange,
    pub ramp_step: u16,
    pub tick_ms: u64,
    pub left_channel: u8,
    pub right_channel: u8,
    pub port: String,
    pub baud_rate: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            pulse: PulseRange::new(PULSE_REVERSE, PULSE_NEUTRAL, PULSE_FORWARD),
            ramp_step: RAMP_STEP,
            tick_ms: TICK_MS,
            left_channel: LEFT_CHANNEL,
            right_channel: RIGHT_CHANNEL,
            port: MOTOR_PORT.to_string(),
            baud_rate: MOTOR_BAUD,
        }
    }
}

impl DriveConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON config document
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pulse.validate()?;
        if self.pulse.forward > MAX_PULSE_US {
            return Err(ConfigError::PulseTooWide {
                forward: self.pulse.forward,
                max: MAX_PULSE_US,
            });
        }
        if self.ramp_step == 0 {
            return Err(ConfigError::Zero { field: "ramp_step" });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Zero { field: "tick_ms" });
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Zero { field: "baud_rate" });
        }
        if self.left_channel == self.right_channel {
            return Err(ConfigError::SharedChannel {
                channel: self.left_channel,
            });
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
