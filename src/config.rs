//! Application configuration
//!
//! Serializable configuration for the monitoring pipeline, persisted as TOML
//! in the user's config directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VitalsError};
use crate::logging::LogConfig;
use crate::monitor::MonitorConfig;

/// Configuration format version
const CONFIG_VERSION: &str = "1.0";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Monitoring pipeline settings
    pub monitor: MonitorConfig,

    /// Logging settings
    pub log: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            metadata: ConfigMetadata {
                version: CONFIG_VERSION.to_string(),
                created_at: now,
                updated_at: now,
            },
            monitor: MonitorConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalrs")
            .join("config.toml")
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|err| VitalsError::Configuration(err.to_string()))?;
        Ok(config)
    }

    /// Persist configuration to `path`, stamping the update time
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|err| VitalsError::Configuration(err.to_string()))?;
        fs::write(path, raw)?;
        Ok(())
    }
}
