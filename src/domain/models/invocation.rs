use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::capability::CapabilitySet;
use super::descriptor::WorkerCategory;

/// Outcome of one operation call or resource read made by the bridge.
///
/// Transient: produced per call and consumed immediately when the combined
/// answer is composed.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub worker_id: String,
    pub operation: String,
    pub arguments: Value,
    /// Success payload or error description
    pub outcome: String,
    pub success: bool,
}

impl InvocationResult {
    pub fn success(worker_id: &str, operation: &str, arguments: Value, outcome: String) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            operation: operation.to_string(),
            arguments,
            outcome,
            success: true,
        }
    }

    pub fn failure(worker_id: &str, operation: &str, arguments: Value, error: String) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            operation: operation.to_string(),
            arguments,
            outcome: error,
            success: false,
        }
    }
}

/// Metadata attached to a [`BridgeOutcome`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BridgeMetadata {
    /// Capability tags inferred from the request text
    pub tags: Vec<WorkerCategory>,
    /// Per-worker capability snapshot at routing time
    pub capabilities: HashMap<String, CapabilitySet>,
    /// Raw invocation results, successes and failures alike
    pub invocations: Vec<InvocationResult>,
}

/// The combined, partial-failure-tolerant answer for one routed request.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeOutcome {
    pub response: String,
    /// Distinct worker ids that contributed to the response
    pub workers: Vec<String>,
    pub metadata: BridgeMetadata,
}

/// One unit of a streamed bridge response.
///
/// `Done` is the terminating sentinel; no chunk follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChunk {
    Text(String),
    Done,
}
