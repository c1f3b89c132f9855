//! Catalog gateway: the single entry point that turns a descriptor into a
//! running, authorized connection.
//!
//! Credential validation happens before anything is started; disable
//! always succeeds from the caller's point of view.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::error::{Result, SwitchboardError};
use crate::domain::models::{CapabilitySet, WorkerDescriptor};
use crate::services::lifecycle::LifecycleManager;
use crate::services::registry::CapabilityRegistry;

/// Caller-facing orchestration over the catalog, lifecycle, and registry.
pub struct CatalogGateway {
    /// Read-only after load
    catalog: HashMap<String, WorkerDescriptor>,
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<CapabilityRegistry>,
    enabled: RwLock<HashSet<String>>,
}

impl CatalogGateway {
    pub fn new(
        descriptors: Vec<WorkerDescriptor>,
        lifecycle: Arc<LifecycleManager>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        let catalog = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.id.clone(), descriptor))
            .collect();
        Self {
            catalog,
            lifecycle,
            registry,
            enabled: RwLock::new(HashSet::new()),
        }
    }

    /// All known descriptors, catalog order unspecified.
    pub fn list_descriptors(&self) -> Vec<&WorkerDescriptor> {
        self.catalog.values().collect()
    }

    /// Look up one descriptor.
    pub fn descriptor(&self, id: &str) -> Option<&WorkerDescriptor> {
        self.catalog.get(id)
    }

    /// Enable a worker: validate credentials, start the process, discover
    /// capabilities, and mark it enabled. On any failure nothing is left
    /// running or marked enabled.
    pub async fn enable(&self, id: &str, credentials: &HashMap<String, String>) -> Result<()> {
        let descriptor = self
            .catalog
            .get(id)
            .ok_or_else(|| SwitchboardError::UnknownWorker(id.to_string()))?;

        // Fail fast before any process exists.
        for name in descriptor.required_credentials() {
            if !credentials.contains_key(name) {
                return Err(SwitchboardError::MissingCredential {
                    worker: id.to_string(),
                    name: name.to_string(),
                });
            }
        }

        let started = self.lifecycle.start(id, descriptor, credentials).await?;
        if !started {
            return Err(SwitchboardError::StartFailed(id.to_string()));
        }

        if let Err(e) = self.registry.discover(id).await {
            // A worker that cannot answer discovery is not usable; undo.
            warn!(worker_id = %id, error = %e, "Discovery failed after start, disabling");
            self.lifecycle.stop(id).await;
            return Err(e);
        }

        self.enabled.write().await.insert(id.to_string());
        info!(worker_id = %id, "Worker enabled");
        Ok(())
    }

    /// Disable a worker. Always clears the enabled flag, even when the
    /// underlying process needed a forced kill.
    pub async fn disable(&self, id: &str) {
        self.lifecycle.stop(id).await;
        self.registry.forget(id).await;
        self.enabled.write().await.remove(id);
        info!(worker_id = %id, "Worker disabled");
    }

    /// Ids currently marked enabled.
    pub async fn enabled_ids(&self) -> Vec<String> {
        self.enabled.read().await.iter().cloned().collect()
    }

    /// `Ready` status per catalog entry. Workers without a live connection
    /// report `false`.
    pub async fn status(&self) -> HashMap<String, bool> {
        let live = self.registry.status().await;
        self.catalog
            .keys()
            .map(|id| (id.clone(), live.get(id).copied().unwrap_or(false)))
            .collect()
    }

    /// Cached capability snapshot for one worker.
    pub async fn capabilities(&self, id: &str) -> Option<CapabilitySet> {
        self.registry.capabilities(id).await
    }

    /// Invoke a named operation on a worker.
    pub async fn invoke(&self, id: &str, operation: &str, args: Value) -> Result<Value> {
        let connection = self
            .lifecycle
            .connection(id)
            .await
            .ok_or_else(|| SwitchboardError::NotConnected(id.to_string()))?;
        connection
            .request(
                "tools/call",
                serde_json::json!({ "name": operation, "arguments": args }),
            )
            .await
    }

    /// Read a resource from a worker by uri.
    pub async fn read_resource(&self, id: &str, uri: &str) -> Result<Value> {
        let connection = self
            .lifecycle
            .connection(id)
            .await
            .ok_or_else(|| SwitchboardError::NotConnected(id.to_string()))?;
        connection
            .request("resources/read", serde_json::json!({ "uri": uri }))
            .await
    }

    /// Health ping round-trip latency.
    pub async fn ping(&self, id: &str) -> Result<Duration> {
        self.registry.ping(id).await
    }

    /// Tear down every running worker; used by the host on shutdown.
    pub async fn shutdown_all(&self) {
        self.lifecycle.shutdown_all().await;
        self.enabled.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CredentialSpec, ProtocolConfig, WorkerCategory};

    fn gateway_with(descriptors: Vec<WorkerDescriptor>) -> CatalogGateway {
        let protocol = ProtocolConfig::default();
        let lifecycle = Arc::new(LifecycleManager::new(protocol.clone()));
        let registry = Arc::new(CapabilityRegistry::new(lifecycle.clone(), &protocol));
        CatalogGateway::new(descriptors, lifecycle, registry)
    }

    fn descriptor_requiring_key() -> WorkerDescriptor {
        WorkerDescriptor {
            id: "api-worker".to_string(),
            name: "API Worker".to_string(),
            category: WorkerCategory::Other,
            command: Some("api-worker".to_string()),
            args: vec![],
            env: HashMap::new(),
            working_dir: None,
            credentials: vec![CredentialSpec {
                name: "API_KEY".to_string(),
                required: true,
            }],
            platforms: vec![],
            defaults: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_enable_unknown_worker() {
        let gateway = gateway_with(vec![]);
        let result = gateway.enable("ghost", &HashMap::new()).await;
        assert!(matches!(result, Err(SwitchboardError::UnknownWorker(_))));
    }

    #[tokio::test]
    async fn test_enable_missing_credential_starts_nothing() {
        let gateway = gateway_with(vec![descriptor_requiring_key()]);

        let result = gateway.enable("api-worker", &HashMap::new()).await;
        assert!(matches!(
            result,
            Err(SwitchboardError::MissingCredential { ref name, .. }) if name == "API_KEY"
        ));

        let status = gateway.status().await;
        assert_eq!(status.get("api-worker"), Some(&false));
        assert!(gateway.enabled_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_disable_is_idempotent() {
        let gateway = gateway_with(vec![descriptor_requiring_key()]);
        gateway.disable("api-worker").await;
        gateway.disable("api-worker").await;
        assert!(gateway.enabled_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_covers_whole_catalog() {
        let gateway = gateway_with(vec![descriptor_requiring_key()]);
        let status = gateway.status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status.get("api-worker"), Some(&false));
    }
}
