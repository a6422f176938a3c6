//! Configuration management for mediafetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediafetch::config::{Config, NodeRole};
//!
//! let config = Config::load(None, NodeRole::Standalone).expect("Failed to load configuration");
//! println!("Listening on: {}", config.server.bind_addr());
//! ```
//!
//! # Environment Variables
//!
//! Settings can be overridden with `MEDIAFETCH__<section>__<key>`:
//! - `MEDIAFETCH__SERVER__PORT=4001`
//! - `MEDIAFETCH__CLUSTER__REGISTRY_URL=http://master:4000`
//! - `MEDIAFETCH__DOWNLOADER__TIMEOUT=20m`
//!
//! The cluster secret is only read from `CLUSTER_SECRET`. `PORT` is honoured
//! for hosting platforms that assign the port.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediafetch.toml`.
//! This can be overridden using the `MEDIAFETCH_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    ClusterConfig, Config, DownloaderConfig, NodeRole, ServerConfig, StorageConfig,
    TelemetryConfig,
};
pub use validation::{ValidationError, is_http_url};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment) and validate
    /// it for the given role
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, a value fails validation,
    /// or a setting the role needs is missing.
    pub fn load(path: Option<PathBuf>, role: NodeRole) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        config.validate_for(role)?;
        Ok(config)
    }

    /// Load configuration from a specific path without process-env secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn validate_for(&self, role: NodeRole) -> Result<(), ValidationError> {
        validation::validate(self)?;
        validation::validate_role(self, role)
    }

    /// Effective configuration rendered as TOML. The secret is never included.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[server]\nport = 5000\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.server.port, 5000);
        assert!(config.validate_for(NodeRole::Standalone).is_ok());
    }

    #[test]
    fn test_validation_catches_overlapping_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[downloader]
timeout = "2h"

[storage]
max_age = "1h"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::SweepOverlapsJobs { .. })
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 4001
max_request_bytes = "32KB"

[cluster]
registry_url = "https://master.example.net"
public_url = "https://worker-eu-1.example.net"
heartbeat_interval = "20s"
heartbeat_timeout = "5s"
worker_ttl = "1m"

[downloader]
binary = "yt-dlp"
cookies_path = "/etc/mediafetch/cookies.txt"
player_client = "android"
video_output_limit = "20MB"
audio_output_limit = "10MB"
timeout = "30m"
max_concurrent_jobs = 3

[storage]
temp_dir = "temp"
sweep_interval = "30m"
max_age = "1h"

[telemetry]
log_filter = "debug"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let mut config = Config::load_from_path(config_path).unwrap();

        // Secret arrives from the environment only
        assert!(config.validate_for(NodeRole::ClusterWorker).is_err());
        config.cluster.secret = Some("shared".to_string());
        assert!(config.validate_for(NodeRole::ClusterWorker).is_ok());

        assert_eq!(config.server.max_request_bytes.as_u64(), 32 * 1024);
        assert_eq!(config.cluster.worker_ttl, HumanDuration::secs(60));
        assert_eq!(config.downloader.max_concurrent_jobs, 3);
        assert_eq!(config.telemetry.log_filter, "debug");
    }

    #[test]
    fn test_to_toml_reloads_and_omits_secret() {
        let mut config = Config::default();
        config.server.port = 4100;
        config.cluster.secret = Some("do-not-print".to_string());

        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("do-not-print"));

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rendered.toml");
        fs::write(&config_path, rendered).unwrap();

        let reloaded = Config::load_from_path(config_path).unwrap();
        assert_eq!(reloaded.server.port, 4100);
        assert_eq!(reloaded.downloader.timeout, config.downloader.timeout);
        assert_eq!(reloaded.storage.max_age, config.storage.max_age);
        assert!(reloaded.cluster.secret.is_none());
    }
}
