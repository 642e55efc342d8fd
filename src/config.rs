//! Configuration module for sharebox.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, ShareboxError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a statement waits on a locked database, in seconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> String {
    "data/sharebox.db".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/sharebox.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Password attempt guard configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Failed attempts allowed before a file is locked for a user.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Lockout duration in seconds, measured from the last failed attempt.
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lockout_secs() -> u64 {
    300
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            lockout_secs: default_lockout_secs(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Attempt guard configuration.
    #[serde(default)]
    pub guard: GuardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ShareboxError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ShareboxError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `SHAREBOX_DB_PATH`: Override the database path
    /// - `SHAREBOX_LOG_LEVEL`: Override the log level
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SHAREBOX_DB_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("SHAREBOX_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(ShareboxError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.guard.max_attempts == 0 {
            return Err(ShareboxError::Config(
                "guard.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
