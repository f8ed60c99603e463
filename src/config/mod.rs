//! # Configuration Management Module
//!
//! This module handles all configuration aspects of realmsweep, providing a
//! centralized configuration system with validation, defaults, and persistence.
//!
//! ## Configuration Structure
//!
//! The configuration is organized into logical sections:
//!
//! - [`ServerConfig`] - Server identity (name, default operator for audit lines)
//! - [`StorageConfig`] - Data directory layout (world list, maps, moderation log)
//! - [`RetirementConfig`] - Retirement policy thresholds
//! - [`LoggingConfig`] - Logging and audit-trail settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use realmsweep::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration from file
//!     let config = Config::load("config.toml").await?;
//!     println!("Server: {}", config.server.name);
//!
//!     // Create default configuration
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! Realmsweep uses TOML format for human-readable configuration:
//!
//! ```toml
//! [server]
//! name = "My World Server"
//! operator = "console"
//!
//! [storage]
//! data_dir = "./data"
//! world_list = "worlds.json"
//!
//! [retirement]
//! min_idle_days = 30
//!
//! [logging]
//! level = "info"
//! file = "realmsweep.log"
//! audit_file = "realmsweep-audit.log"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Display name of the server whose data directory is being managed.
    pub name: String,
    /// Default actor recorded in broadcasts and the audit log when the CLI is
    /// invoked without `--actor`.
    pub operator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// World list file name inside `data_dir`.
    #[serde(default = "default_world_list")]
    pub world_list: String,
    /// Optional override for the maps directory; defaults to `<data_dir>/maps`.
    #[serde(default)]
    pub maps_dir: Option<String>,
    /// Optional override for the moderation-log database; defaults to `<data_dir>/modlog`.
    #[serde(default)]
    pub modlog_dir: Option<String>,
}

fn default_world_list() -> String {
    "worlds.json".to_string()
}

/// Retirement policy thresholds.
///
/// The plugin this tool replaces advertised a one-month inactivity requirement
/// in its help text but compared against a single day in the guard. The
/// threshold is a configuration value here rather than a constant in the policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetirementConfig {
    /// Days a realm's map file must have gone unwritten before it may be retired.
    #[serde(default = "default_min_idle_days")]
    pub min_idle_days: i64,
}

fn default_min_idle_days() -> i64 {
    30
}

/// Upper bound for `min_idle_days` (a century). `chrono::Duration::days`
/// panics far past this, so absurd values are rejected at load time.
pub const MAX_IDLE_DAYS: i64 = 36_500;

impl Default for RetirementConfig {
    fn default() -> Self {
        Self {
            min_idle_days: default_min_idle_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Separate file receiving only `audit`-target records (successful removals).
    #[serde(default)]
    pub audit_file: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub retirement: RetirementConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.retirement.min_idle_days < 1 {
            return Err(anyhow!(
                "retirement.min_idle_days must be at least 1 (got {})",
                config.retirement.min_idle_days
            ));
        }
        if config.retirement.min_idle_days > MAX_IDLE_DAYS {
            return Err(anyhow!(
                "retirement.min_idle_days must be at most {} (got {})",
                MAX_IDLE_DAYS,
                config.retirement.min_idle_days
            ));
        }

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Absolute-ish path of the world list file.
    pub fn world_list_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join(&self.storage.world_list)
    }

    /// Directory holding the map files the world list refers to.
    pub fn maps_path(&self) -> PathBuf {
        match &self.storage.maps_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.storage.data_dir).join("maps"),
        }
    }

    /// Directory of the sled moderation-log database.
    pub fn modlog_path(&self) -> PathBuf {
        match &self.storage.modlog_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.storage.data_dir).join("modlog"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                name: "World Server".to_string(),
                operator: "console".to_string(),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                world_list: default_world_list(),
                maps_dir: None,
                modlog_dir: None,
            },
            retirement: RetirementConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("realmsweep.log".to_string()),
                audit_file: Some("realmsweep-audit.log".to_string()),
            },
        }
    }
}
