use thiserror::Error;

/// Errors that can occur across catalog, lifecycle, and protocol operations
#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing required credential '{name}' for worker '{worker}'")]
    MissingCredential { worker: String, name: String },

    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Failed to spawn worker '{worker}': {source}")]
    Spawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker '{0}' failed to start")]
    StartFailed(String),

    #[error("Worker '{0}' is not connected")]
    NotConnected(String),

    #[error("Call '{method}' timed out after {timeout_secs}s")]
    Timeout { method: String, timeout_secs: u64 },

    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Connection to worker '{0}' lost")]
    ConnectionLost(String),
}

impl SwitchboardError {
    /// Whether this error came from the worker side rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Result type alias for switchboard operations
pub type Result<T> = std::result::Result<T, SwitchboardError>;
