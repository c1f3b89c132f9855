//! Worker process lifecycle management.
//!
//! Starts, supervises, and terminates one OS process per worker, keeping
//! each connection object consistent with process reality. Stop escalates
//! from a best-effort shutdown notification through SIGTERM to SIGKILL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::error::{Result, SwitchboardError};
use crate::domain::models::{ProtocolConfig, WorkerDescriptor};
use crate::infrastructure::rpc::{Connection, ConnectionState};

/// Supervises one connection per worker id.
///
/// Connections are owned here and never handed out mutably; callers reach
/// them through [`LifecycleManager::connection`] as shared references.
pub struct LifecycleManager {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    protocol: ProtocolConfig,
}

impl LifecycleManager {
    pub fn new(protocol: ProtocolConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            protocol,
        }
    }

    /// Start a worker process and drive it to `Ready`.
    ///
    /// Resolves the effective launch command (explicit override wins over
    /// the per-category default), spawns with the merged environment, and
    /// runs the handshake after a short settle delay.
    ///
    /// Returns `Err` only for configuration problems. Spawn or handshake
    /// failure returns `Ok(false)` and retains no connection, so callers
    /// can surface a clean "failed to start".
    pub async fn start(
        &self,
        id: &str,
        descriptor: &WorkerDescriptor,
        overrides: &HashMap<String, String>,
    ) -> Result<bool> {
        let Some((command, args)) = descriptor.resolve_command() else {
            return Err(SwitchboardError::Configuration(format!(
                "no launch command for worker '{id}' (category '{}' has no default)",
                descriptor.category
            )));
        };

        {
            // A stopped connection is terminal; a fresh start replaces it.
            let mut connections = self.connections.write().await;
            if let Some(existing) = connections.get(id) {
                if existing.state().await == ConnectionState::Stopped {
                    connections.remove(id);
                } else {
                    return Err(SwitchboardError::Configuration(format!(
                        "worker '{id}' is already running"
                    )));
                }
            }
        }

        // Descriptor env and defaults first, runtime overrides on top.
        let mut env: HashMap<String, String> = descriptor.defaults.clone();
        env.extend(descriptor.env.clone());
        env.extend(overrides.clone());

        info!(worker_id = %id, %command, "Starting worker");
        let connection = match Connection::spawn(
            id,
            &command,
            &args,
            &env,
            descriptor.working_dir.as_deref(),
            Duration::from_secs(self.protocol.request_timeout_secs),
        ) {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                let err = SwitchboardError::Spawn {
                    worker: id.to_string(),
                    source: e,
                };
                warn!(worker_id = %id, error = %err, "Failed to spawn worker");
                return Ok(false);
            }
        };

        // Give the process a moment to come up before talking to it.
        tokio::time::sleep(Duration::from_millis(self.protocol.settle_delay_ms)).await;

        if let Err(e) = connection.handshake().await {
            warn!(worker_id = %id, error = %e, "Handshake failed, tearing worker down");
            self.terminate(&connection).await;
            return Ok(false);
        }

        self.connections
            .write()
            .await
            .insert(id.to_string(), connection);
        Ok(true)
    }

    /// Stop a worker: best-effort shutdown notification, SIGTERM, then a
    /// forced kill after the grace window. The connection entry is always
    /// removed once the process is confirmed gone.
    pub async fn stop(&self, id: &str) {
        let connection = self.connections.write().await.remove(id);
        let Some(connection) = connection else {
            debug!(worker_id = %id, "Stop requested for worker with no connection");
            return;
        };

        info!(worker_id = %id, "Stopping worker");
        connection.mark_stopping();

        // Failures here are expected when the worker is already wedged.
        let _ = connection.notify("shutdown", json!({})).await;

        self.terminate(&connection).await;

        // Teardown fails any calls still pending against this worker.
        connection.abort_pending().await;
    }

    /// SIGTERM, wait out the grace window, escalate to SIGKILL.
    async fn terminate(&self, connection: &Connection) {
        let grace = Duration::from_secs(self.protocol.stop_grace_secs);

        signal_process(connection, Signal::SIGTERM);

        if !connection.wait_exited(grace).await {
            warn!(
                worker_id = %connection.worker_id(),
                grace_secs = grace.as_secs(),
                "Worker did not exit within grace window, forcing kill"
            );
            signal_process(connection, Signal::SIGKILL);
            connection.wait_exited(grace).await;
        }
    }

    /// Shared handle to a worker's connection, if one is live.
    pub async fn connection(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Pure read of `Ready` membership across all connections.
    pub async fn status(&self) -> HashMap<String, bool> {
        let connections = self.connections.read().await;
        let mut map = HashMap::with_capacity(connections.len());
        for (id, connection) in connections.iter() {
            map.insert(
                id.clone(),
                connection.state().await == ConnectionState::Ready,
            );
        }
        map
    }

    /// Ids of workers with a live connection, in no particular order.
    pub async fn running_ids(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Tear down every connection. Invoked explicitly by the host
    /// application on shutdown; there is no ambient signal registry.
    pub async fn shutdown_all(&self) {
        let ids = self.running_ids().await;
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "Shutting down all workers");
        for id in ids {
            self.stop(&id).await;
        }
    }
}

fn signal_process(connection: &Connection, signal: Signal) {
    let Some(pid) = connection.pid() else {
        return;
    };
    #[allow(clippy::cast_possible_wrap)]
    if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
        debug!(pid, %signal, error = %e, "Signal failed (process may already be gone)");
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        // Best-effort: make sure no child outlives the manager. Connections
        // spawn with kill_on_drop, so releasing them here is enough.
        if let Ok(mut connections) = self.connections.try_write() {
            connections.clear();
        }
    }
}
