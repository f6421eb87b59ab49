//! Ledger configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::refresh::HISTORY_REFRESH_COOLDOWN_SECS;

/// Configuration for a [`Ledger`](crate::Ledger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Minimum seconds between provider history refreshes per account.
    #[serde(default = "default_refresh_cooldown")]
    pub refresh_cooldown_secs: u64,
    /// Privileged URL handed to authenticated, active subscribers.
    #[serde(default)]
    pub perk_url: Option<String>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

// Default value functions

fn default_refresh_cooldown() -> u64 {
    HISTORY_REFRESH_COOLDOWN_SECS
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            refresh_cooldown_secs: default_refresh_cooldown(),
            perk_url: None,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        // Check env var override first
        if let Ok(dir) = std::env::var("TENURE_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".tenure"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/tenure"))
            .join("config.toml")
    }
}
