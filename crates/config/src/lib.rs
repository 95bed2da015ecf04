//! Fluxo Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use fluxo_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[server]\nport = 9191").unwrap();
//! assert_eq!(config.server.port, 9191);
//! ```
//!
//! # Example Minimal Config
//!
//! ```toml
//! [storage]
//! temp_dir = "/var/tmp/fluxo"
//!
//! [object_store]
//! root = "/var/lib/fluxo/objects"
//! base_url = "https://files.internal/exports"
//! ```
//!
//! Deployment secrets and paths can also come from the environment:
//! `FLUXO_STORE_ROOT`, `FLUXO_STORE_BASE_URL`, `FLUXO_LOG_LEVEL`.

mod concurrency;
mod error;
mod log;
mod object_store;
mod server;
mod storage;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use concurrency::ConcurrencyConfig;
pub use error::{ConfigError, Result};
pub use log::LogConfig;
pub use object_store::ObjectStoreConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stream transport listener settings
    pub server: ServerConfig,

    /// Worker pool and admission queue settings
    pub concurrency: ConcurrencyConfig,

    /// Temporary artifact storage settings
    pub storage: StorageConfig,

    /// Object store and uploader settings
    pub object_store: ObjectStoreConfig,

    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Apply environment overrides for deployment settings
    ///
    /// Recognized variables: `FLUXO_STORE_ROOT`, `FLUXO_STORE_BASE_URL`,
    /// `FLUXO_LOG_LEVEL`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("FLUXO_STORE_ROOT") {
            if !value.is_empty() {
                self.object_store.root = value;
            }
        }
        if let Ok(value) = std::env::var("FLUXO_STORE_BASE_URL") {
            if !value.is_empty() {
                self.object_store.base_url = value;
            }
        }
        if let Ok(value) = std::env::var("FLUXO_LOG_LEVEL") {
            if !value.is_empty() {
                self.log.level = value;
            }
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.concurrency.max_concurrent_tasks, 10);
        assert_eq!(config.concurrency.task_queue_size, 100);
        assert_eq!(config.storage.retention_secs, 3600);
        assert_eq!(config.object_store.part_size, 10 * 1024 * 1024);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
[server]
port = 7000

[concurrency]
max_concurrent_tasks = 2
task_queue_size = 2
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.concurrency.max_concurrent_tasks, 2);
        assert_eq!(config.concurrency.task_queue_size, 2);
        // Defaults still apply
        assert_eq!(config.concurrency.queue_timeout_secs, 300);
        assert_eq!(config.object_store.max_retries, 3);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_str("not [valid").is_err());
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let toml = r#"
[concurrency]
max_concurrent_tasks = 0
"#;
        assert!(matches!(
            Config::from_str(toml),
            Err(ConfigError::Invalid(_))
        ));
    }
}
