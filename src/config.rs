//! Index Configuration
//!
//! Placement of an index inside its container and the log floor.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Index configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name used in logs (default: "index")
    #[serde(default = "default_name")]
    pub name: String,

    /// Reserved slot holding the persisted list (default: 0)
    #[serde(default)]
    pub reserved_slot: usize,

    /// Header bytes left untouched at the start of the slot (default: 0)
    #[serde(default)]
    pub byte_offset: u64,

    /// Lowest severity written by the logger (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_name() -> String {
    "index".to_string()
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            reserved_slot: 0,
            byte_offset: 0,
            log_level: default_log_level(),
        }
    }
}

impl IndexConfig {
    /// Config for `name` in `reserved_slot`, other fields defaulted
    pub fn new(name: impl Into<String>, reserved_slot: usize) -> Self {
        Self {
            name: name.into(),
            reserved_slot,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;

        let shown = path.display().to_string();
        let slot = config.reserved_slot.to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("index", config.name.as_str()),
                ("path", shown.as_str()),
                ("reserved_slot", slot.as_str()),
            ],
        );
        Ok(config)
    }

    /// Reject configurations no store can use
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply the log floor process-wide
    pub fn apply_logging(&self) {
        Logger::set_min_severity(self.log_level);
    }
}
