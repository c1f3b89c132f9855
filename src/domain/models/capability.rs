use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An invocable operation exposed by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON schema describing the operation's input shape
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

/// A readable resource exposed by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub uri: String,

    #[serde(default)]
    pub name: String,
}

/// The negotiated capability set of one worker, populated after handshake.
///
/// Read-mostly cache; refreshed only by re-running the discovery calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub operations: Vec<OperationInfo>,
    pub resources: Vec<ResourceInfo>,
}

impl CapabilitySet {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.resources.is_empty()
    }
}
