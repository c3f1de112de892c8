//! Machine configuration and ROM loading.
//!
//! A config file is JSON; every field is optional:
//!
//! ```json
//! {
//!   "tick_interval_ms": 100,
//!   "instructions_per_second": 500,
//!   "display_width": 64,
//!   "display_height": 32,
//!   "quirks": { "shift": "vx", "bcd": "canonical" }
//! }
//! ```

use crate::cpu::quirks::Quirks;
use crate::devices::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Runtime settings for a machine and its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler period.
    pub tick_interval_ms: u64,
    /// Target instruction rate, spread over the ticks of each second.
    pub instructions_per_second: u32,
    pub display_width: usize,
    pub display_height: usize,
    pub quirks: Quirks,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            instructions_per_second: 500,
            display_width: DEFAULT_WIDTH,
            display_height: DEFAULT_HEIGHT,
            quirks: Quirks::default(),
        }
    }
}

impl Config {
    /// Read a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Reject settings no machine can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.display_width == 0 || self.display_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "display must be at least 1x1, got {}x{}",
                self.display_width, self.display_height
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Steps per tick: `instructions_per_second × interval / 1000`, at least 1.
    pub fn batch_size(&self) -> u32 {
        let batch = self.instructions_per_second as u64 * self.tick_interval_ms / 1000;
        batch.clamp(1, u32::MAX as u64) as u32
    }
}

/// Read a raw program image from disk.
pub fn load_rom<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path.as_ref()).map_err(|e| ConfigError::IoError(e.to_string()))
}

/// Errors from reading configuration or ROM files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::quirks::{BcdLayout, ShiftSource};

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.batch_size(), 50);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.quirks, Quirks::literal());
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(
            r#"{ "instructions_per_second": 700, "quirks": { "shift": "vx" } }"#,
        )
        .unwrap();

        assert_eq!(config.batch_size(), 70);
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.quirks.shift, ShiftSource::Vx);
        assert_eq!(config.quirks.bcd, BcdLayout::Literal);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let config = Config {
            instructions_per_second: 5,
            tick_interval_ms: 16,
            ..Config::default()
        };
        assert_eq!(config.batch_size(), 1);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_json(r#"{ "tick_interval_ms": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "display_width": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json("not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = Config {
            quirks: Quirks::canonical(),
            ..Config::default()
        };
        let text = config.to_json().unwrap();
        assert_eq!(Config::from_json(&text), Ok(config));
    }

    #[test]
    fn test_missing_files() {
        assert!(matches!(
            Config::load("/nonexistent/chip8.json"),
            Err(ConfigError::IoError(_))
        ));
        assert!(matches!(
            load_rom("/nonexistent/game.ch8"),
            Err(ConfigError::IoError(_))
        ));
    }
}
