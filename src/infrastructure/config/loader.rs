use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid request_timeout_secs: {0}. Must be at least 1")]
    InvalidRequestTimeout(u64),

    #[error("Invalid stop_grace_secs: {0}. Must be at least 1")]
    InvalidStopGrace(u64),

    #[error("Invalid ping_timeout_secs: {0}. Must be at least 1")]
    InvalidPingTimeout(u64),

    #[error("Worker id cannot be empty")]
    EmptyWorkerId,

    #[error("Duplicate worker id: {0}")]
    DuplicateWorkerId(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .switchboard/config.yaml (project config)
    /// 3. .switchboard/local.yaml (project local overrides, optional)
    /// 4. Environment variables (SWITCHBOARD_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".switchboard/config.yaml"))
            .merge(Yaml::file(".switchboard/local.yaml"))
            .merge(Env::prefixed("SWITCHBOARD_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.protocol.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout(
                config.protocol.request_timeout_secs,
            ));
        }

        if config.protocol.stop_grace_secs == 0 {
            return Err(ConfigError::InvalidStopGrace(config.protocol.stop_grace_secs));
        }

        if config.protocol.ping_timeout_secs == 0 {
            return Err(ConfigError::InvalidPingTimeout(
                config.protocol.ping_timeout_secs,
            ));
        }

        let mut seen = HashSet::new();
        for worker in &config.workers {
            if worker.id.is_empty() {
                return Err(ConfigError::EmptyWorkerId);
            }
            if !seen.insert(worker.id.as_str()) {
                return Err(ConfigError::DuplicateWorkerId(worker.id.clone()));
            }
        }

        Ok(())
    }
}
