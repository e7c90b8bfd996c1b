//! Engine configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::EloEngine;

/// Elo parameters.
#[derive(Debug, Clone, Copy, PartialEq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct EloConfig {
    /// K factor applied to every pairing.
    #[serde(default = "default_k_factor")]
    k_factor: f64,

    /// Rating of users without an Elo record.
    #[serde(default = "default_starting_rating")]
    starting_rating: f64,
}

fn default_k_factor() -> f64 {
    32.0
}

fn default_starting_rating() -> f64 {
    1500.0
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            starting_rating: default_starting_rating(),
        }
    }
}

impl EloConfig {
    /// Builds the rating engine for these parameters.
    pub fn engine(&self) -> EloEngine {
        EloEngine::new(self.k_factor, self.starting_rating)
    }
}

/// Configuration for the revision engine and its SQLite store.
#[derive(Debug, Clone, PartialEq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct EngineConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    db_path: String,

    /// How long a storage operation waits on a locked database before
    /// failing with a transient error.
    #[serde(default = "default_busy_timeout_ms")]
    busy_timeout_ms: u64,

    /// Rating parameters.
    #[serde(default)]
    elo: EloConfig,

    /// Largest player count a game may be created with.
    #[serde(default = "default_max_players")]
    max_players: usize,

    /// Whether notifications are dispatched after commits.
    #[serde(default = "default_notify")]
    notify: bool,
}

fn default_db_path() -> String {
    "turnstack.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_max_players() -> usize {
    6
}

fn default_notify() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            elo: EloConfig::default(),
            max_players: default_max_players(),
            notify: default_notify(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        if config.max_players == 0 {
            return Err(ConfigError::new("max_players must be at least 1"));
        }
        info!(db_path = %config.db_path, "Config loaded successfully");
        Ok(config)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
