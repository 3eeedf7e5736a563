//! Engine configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/levelforge/config.toml)
//! 3. Environment variables (LEVELFORGE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "LEVELFORGE";

/// Usage ratio at which the storage estimate logs an advisory warning
pub const DEFAULT_WARN_RATIO: f64 = 0.8;

/// Storage engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite database, legacy key-value files)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Capacity allotted to the database, in bytes.
    ///
    /// When unset the engine has no quota facility: writes are only bounded
    /// by the disk and `Store::get_storage_estimate` returns `None`.
    #[serde(default)]
    pub quota_bytes: Option<u64>,

    /// Usage ratio at which a quota warning is logged
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            quota_bytes: None,
            warn_ratio: DEFAULT_WARN_RATIO,
        }
    }
}

impl Config {
    /// Build a configuration rooted at `data_dir` with every other value defaulted
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LEVELFORGE_DATA_DIR, LEVELFORGE_QUOTA_BYTES, LEVELFORGE_WARN_RATIO)
    /// 2. Config file (~/.config/levelforge/config.toml or LEVELFORGE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears the quota
        if let Ok(val) = std::env::var(format!("{}_QUOTA_BYTES", ENV_PREFIX)) {
            self.quota_bytes = if val.trim().is_empty() {
                None
            } else {
                Some(
                    val.trim()
                        .parse()
                        .with_context(|| format!("Invalid {}_QUOTA_BYTES: {:?}", ENV_PREFIX, val))?,
                )
            };
        }

        if let Ok(val) = std::env::var(format!("{}_WARN_RATIO", ENV_PREFIX)) {
            self.warn_ratio = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}_WARN_RATIO: {:?}", ENV_PREFIX, val))?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(self.warn_ratio > 0.0 && self.warn_ratio <= 1.0) {
            anyhow::bail!(
                "warn_ratio must be in (0, 1], got {}",
                self.warn_ratio
            );
        }
        if self.quota_bytes == Some(0) {
            anyhow::bail!("quota_bytes must be greater than zero");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LEVELFORGE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("levelforge")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("levelforge.db")
    }

    /// Get the directory holding the legacy flat key-value files
    pub fn legacy_dir(&self) -> PathBuf {
        self.data_dir.join("legacy")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("levelforge")
}

fn default_warn_ratio() -> f64 {
    DEFAULT_WARN_RATIO
}
