//! Capability discovery and health tracking.
//!
//! Caches what each `Ready` worker can do and verifies it is still
//! responsive. Discovery results are read-mostly; a failed ping degrades
//! the connection without tearing it down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::error::{Result, SwitchboardError};
use crate::domain::models::{CapabilitySet, OperationInfo, ProtocolConfig, ResourceInfo};
use crate::services::lifecycle::LifecycleManager;

/// Per-worker capability cache plus health checks.
pub struct CapabilityRegistry {
    lifecycle: Arc<LifecycleManager>,
    capabilities: RwLock<HashMap<String, CapabilitySet>>,
    ping_timeout: Duration,
}

impl CapabilityRegistry {
    pub fn new(lifecycle: Arc<LifecycleManager>, protocol: &ProtocolConfig) -> Self {
        Self {
            lifecycle,
            capabilities: RwLock::new(HashMap::new()),
            ping_timeout: Duration::from_secs(protocol.ping_timeout_secs),
        }
    }

    /// Run the two discovery calls and cache the result as the worker's
    /// capability set. Invoked after `Ready` is reached; re-invocable to
    /// refresh the cache.
    pub async fn discover(&self, id: &str) -> Result<CapabilitySet> {
        let connection = self
            .lifecycle
            .connection(id)
            .await
            .ok_or_else(|| SwitchboardError::NotConnected(id.to_string()))?;

        let tools = connection.request("tools/list", json!({})).await?;
        let operations: Vec<OperationInfo> = tools
            .get("tools")
            .and_then(|v| v.as_array())
            .map(|array| {
                array
                    .iter()
                    .filter_map(|tool| serde_json::from_value(tool.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        // Not every worker serves resources; an error reply here means an
        // empty resource list, not a failed discovery.
        let resources: Vec<ResourceInfo> = match connection.request("resources/list", json!({})).await {
            Ok(value) => value
                .get("resources")
                .and_then(|v| v.as_array())
                .map(|array| {
                    array
                        .iter()
                        .filter_map(|resource| serde_json::from_value(resource.clone()).ok())
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) if e.is_remote() => {
                debug!(worker_id = %id, error = %e, "Worker does not serve resources");
                vec![]
            }
            Err(e) => return Err(e),
        };

        let set = CapabilitySet {
            operations,
            resources,
        };
        info!(
            worker_id = %id,
            operations = set.operations.len(),
            resources = set.resources.len(),
            "Discovered worker capabilities"
        );

        self.capabilities
            .write()
            .await
            .insert(id.to_string(), set.clone());
        Ok(set)
    }

    /// Cached capability set for a worker, if discovery has run.
    pub async fn capabilities(&self, id: &str) -> Option<CapabilitySet> {
        self.capabilities.read().await.get(id).cloned()
    }

    /// Drop the cached capability set (on disable/stop).
    pub async fn forget(&self, id: &str) {
        self.capabilities.write().await.remove(id);
    }

    /// Lightweight round-trip health check.
    ///
    /// Records wall-clock latency on success; failure flips the connection
    /// to `Degraded` without tearing it down.
    pub async fn ping(&self, id: &str) -> Result<Duration> {
        let connection = self
            .lifecycle
            .connection(id)
            .await
            .ok_or_else(|| SwitchboardError::NotConnected(id.to_string()))?;

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.ping_timeout, connection.request("ping", json!({}))).await;

        match outcome {
            Ok(Ok(_)) => {
                let latency = started.elapsed();
                connection.record_ping_success().await;
                debug!(worker_id = %id, latency_ms = latency.as_millis() as u64, "Ping ok");
                Ok(latency)
            }
            Ok(Err(e)) => {
                warn!(worker_id = %id, error = %e, "Ping failed");
                connection.record_ping_failure().await;
                Err(e)
            }
            Err(_) => {
                warn!(worker_id = %id, timeout_secs = self.ping_timeout.as_secs(), "Ping timed out");
                connection.record_ping_failure().await;
                Err(SwitchboardError::Timeout {
                    method: "ping".to_string(),
                    timeout_secs: self.ping_timeout.as_secs(),
                })
            }
        }
    }

    /// Pure read of current `Ready` membership; never triggers I/O.
    pub async fn status(&self) -> HashMap<String, bool> {
        self.lifecycle.status().await
    }
}
