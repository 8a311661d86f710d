//! Configuration management for Quickdraw.
//!
//! Configuration is loaded from the platform config directory
//! (`~/.config/quickdraw/config.toml` on Linux) with sensible defaults.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Quickdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Race timing and retry settings
    pub race: RaceConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Chat responders raced for every query
    pub responders: Vec<ResponderConfig>,

    /// Table-extraction API settings
    pub extract_table: ExtractTableConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            race: RaceConfig::default(),
            logging: LoggingConfig::default(),
            responders: default_responders(),
            extract_table: ExtractTableConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.quickdraw.quickdraw/config.toml
    /// - Linux: ~/.config/quickdraw/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\quickdraw\config\config.toml
    ///
    /// Falls back to ~/.quickdraw/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "quickdraw", "quickdraw")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".quickdraw").join("config.toml")
            })
    }

    /// Look up a responder entry by name.
    pub fn responder(&self, name: &str) -> Option<&ResponderConfig> {
        self.responders.iter().find(|r| r.name == name)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
