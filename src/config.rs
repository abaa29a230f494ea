// Loop timing, protocol constants, and the session config file

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::state::ActionKind;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Send a heartbeat after this much time with no outbound traffic
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

// Raw stick range and deadzone (signed 16-bit readings)
pub const JOYSTICK_MAX: i32 = 32768;
pub const DEADZONE: i32 = JOYSTICK_MAX / 10;

// PWM range on the receiver; trim bounds are clamped into [0, PWM_MAX]
pub const PWM_MAX: u32 = 255;

// Motor slots per session
pub const MAX_MOTORS: usize = 8;

pub const DEFAULT_REMOTE: &str = "192.168.4.1:7245";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config binds no motors")]
    NoMotors,
}

/// Per-motor calibration from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorConfig {
    /// Physical axis this motor follows (small integer id from the input adapter).
    pub axis: u8,
    /// Trim bounds, the command magnitude range in [0, PWM_MAX].
    #[serde(default)]
    pub min: u32,
    #[serde(default = "default_trim_max")]
    pub max: u32,
    /// Direction multiplier, -1 or 1.
    #[serde(default = "default_dir")]
    pub dir: i32,
}

fn default_trim_max() -> u32 {
    PWM_MAX
}

fn default_dir() -> i32 {
    1
}

/// One button binding from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonConfig {
    /// Small integer button id from the input adapter.
    pub button: u8,
    pub action: ActionKind,
    /// Macro file path, only meaningful when `action` is `run_macro`.
    #[serde(default)]
    pub macro_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_remote")]
    pub remote: String,
    pub motors: Vec<MotorConfig>,
    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let mut cfg: Config = serde_json::from_str(&raw)?;
        cfg.clamp();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve out-of-range values to documented defaults. Never an error.
    fn clamp(&mut self) {
        if self.motors.len() > MAX_MOTORS {
            warn!(
                "config binds {} motors, keeping the first {}",
                self.motors.len(),
                MAX_MOTORS
            );
            self.motors.truncate(MAX_MOTORS);
        }
        for (i, m) in self.motors.iter_mut().enumerate() {
            if m.max > PWM_MAX {
                warn!("motor {}: max {} clamped to {}", i, m.max, PWM_MAX);
                m.max = PWM_MAX;
            }
            if m.min > m.max {
                warn!("motor {}: min {} clamped to max {}", i, m.min, m.max);
                m.min = m.max;
            }
            if m.dir != 1 && m.dir != -1 {
                warn!("motor {}: dir {} is not -1 or 1, assuming 1", i, m.dir);
                m.dir = 1;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.motors.is_empty() {
            return Err(ConfigError::NoMotors);
        }
        Ok(())
    }
}
