use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::descriptor::{CredentialSpec, WorkerCategory, WorkerDescriptor};

/// Main configuration structure for Switchboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Protocol timing configuration
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Worker catalog entries
    #[serde(default)]
    pub workers: Vec<WorkerEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            protocol: ProtocolConfig::default(),
            workers: vec![],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Protocol and lifecycle timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProtocolConfig {
    /// Deadline for a call awaiting its reply, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between spawn and handshake, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Grace window between terminate signal and forced kill, in seconds
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,

    /// Deadline for a health ping round-trip, in seconds
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_settle_delay_ms() -> u64 {
    300
}

const fn default_stop_grace_secs() -> u64 {
    5
}

const fn default_ping_timeout_secs() -> u64 {
    5
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            stop_grace_secs: default_stop_grace_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
        }
    }
}

/// One worker catalog entry as it appears in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerEntry {
    /// Stable worker identifier
    pub id: String,

    /// Display name; defaults to the id
    #[serde(default)]
    pub name: Option<String>,

    /// Category tag
    pub category: WorkerCategory,

    /// Explicit launch command override
    #[serde(default)]
    pub command: Option<String>,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Credential requirements
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,

    /// Declared target platforms
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Default configuration map
    #[serde(default)]
    pub defaults: HashMap<String, String>,
}

impl From<WorkerEntry> for WorkerDescriptor {
    fn from(entry: WorkerEntry) -> Self {
        let name = entry.name.unwrap_or_else(|| entry.id.clone());
        Self {
            id: entry.id,
            name,
            category: entry.category,
            command: entry.command,
            args: entry.args,
            env: entry.env,
            working_dir: entry.working_dir,
            credentials: entry.credentials,
            platforms: entry.platforms,
            defaults: entry.defaults,
        }
    }
}
