//! Tool-routing bridge.
//!
//! Turns one free-text request plus a set of enabled workers into a
//! combined, partial-failure-tolerant answer: classify the request into
//! capability tags, select a bounded set of matching operations and
//! resources per worker, invoke them concurrently, and compose the
//! outcomes into a single response. Stateless per call.

pub mod arguments;
pub mod classifier;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::models::{
    BridgeMetadata, BridgeOutcome, CapabilitySet, InvocationResult, OperationInfo, ResourceInfo,
    RouteChunk, WorkerCategory,
};
use crate::infrastructure::rpc::Connection;
use crate::services::lifecycle::LifecycleManager;
use crate::services::registry::CapabilityRegistry;

/// Fan-out bounds per worker for a single request.
const MAX_OPERATIONS_PER_WORKER: usize = 3;
const MAX_RESOURCES_PER_WORKER: usize = 2;

/// Characters of result payload quoted in the composed response.
const PREVIEW_CHARS: usize = 240;

/// Stateless router from request text to a combined worker answer.
pub struct RoutingBridge {
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<CapabilityRegistry>,
}

impl RoutingBridge {
    pub fn new(lifecycle: Arc<LifecycleManager>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            lifecycle,
            registry,
        }
    }

    /// Route one request across the given workers and compose the answer.
    pub async fn route(&self, text: &str, enabled_ids: &[String]) -> BridgeOutcome {
        let tags = classifier::classify(text);
        let actions = classifier::actions_in(text);
        debug!(?tags, ?actions, "Classified request");

        let status = self.registry.status().await;

        let mut snapshot: HashMap<String, CapabilitySet> = HashMap::new();
        let mut planned: Vec<(Arc<Connection>, String, OperationInfo, Value)> = Vec::new();
        let mut planned_reads: Vec<(Arc<Connection>, String, ResourceInfo)> = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for id in enabled_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if !status.get(id.as_str()).copied().unwrap_or(false) {
                debug!(worker_id = %id, "Skipping worker that is not ready");
                continue;
            }
            let Some(connection) = self.lifecycle.connection(id).await else {
                continue;
            };
            let Some(caps) = self.registry.capabilities(id).await else {
                debug!(worker_id = %id, "Skipping worker with no discovered capabilities");
                continue;
            };

            for operation in select_operations(&caps, &tags, &actions) {
                let args = arguments::extract_arguments(text, operation);
                planned.push((
                    connection.clone(),
                    id.clone(),
                    operation.clone(),
                    args,
                ));
            }
            for resource in select_resources(&caps, &tags) {
                planned_reads.push((connection.clone(), id.clone(), resource.clone()));
            }

            snapshot.insert(id.clone(), caps);
        }

        // All invocations run concurrently and are all joined, failures
        // included; one broken worker degrades the answer, never aborts it.
        let invocations = join_all(planned.into_iter().map(
            |(connection, worker_id, operation, args)| async move {
                invoke_operation(&connection, &worker_id, &operation, args).await
            },
        ))
        .await;

        let reads = join_all(planned_reads.into_iter().map(
            |(connection, worker_id, resource)| async move {
                read_resource(&connection, &worker_id, &resource).await
            },
        ))
        .await;

        let outcome = compose(text, &tags, snapshot, invocations, reads);
        info!(
            workers = outcome.workers.len(),
            invocations = outcome.metadata.invocations.len(),
            "Routed request"
        );
        outcome
    }

    /// Same as [`RoutingBridge::route`], delivering the composed response
    /// incrementally. The final chunk is always the `Done` sentinel.
    pub async fn stream_route(
        &self,
        text: &str,
        enabled_ids: &[String],
        mut on_chunk: impl FnMut(RouteChunk),
    ) -> BridgeOutcome {
        let outcome = self.route(text, enabled_ids).await;
        for section in outcome.response.split("\n\n") {
            if !section.is_empty() {
                on_chunk(RouteChunk::Text(format!("{section}\n\n")));
            }
        }
        on_chunk(RouteChunk::Done);
        outcome
    }
}

/// Select at most [`MAX_OPERATIONS_PER_WORKER`] operations whose name or
/// description matches an inferred tag keyword or an action keyword from
/// the request. Capability-set order is kept; no ranking is promised.
fn select_operations<'a>(
    caps: &'a CapabilitySet,
    tags: &[WorkerCategory],
    actions: &[&str],
) -> Vec<&'a OperationInfo> {
    caps.operations
        .iter()
        .filter(|op| {
            let haystack = format!("{} {}", op.name, op.description).to_lowercase();
            let tag_hit = tags
                .iter()
                .flat_map(|tag| classifier::tag_keywords(*tag))
                .any(|keyword| haystack.contains(keyword));
            let action_hit = actions.iter().any(|action| haystack.contains(action));
            tag_hit || action_hit
        })
        .take(MAX_OPERATIONS_PER_WORKER)
        .collect()
}

/// Select at most [`MAX_RESOURCES_PER_WORKER`] resources by tag match.
fn select_resources<'a>(caps: &'a CapabilitySet, tags: &[WorkerCategory]) -> Vec<&'a ResourceInfo> {
    caps.resources
        .iter()
        .filter(|resource| {
            let haystack = format!("{} {}", resource.uri, resource.name).to_lowercase();
            tags.iter()
                .flat_map(|tag| classifier::tag_keywords(*tag))
                .any(|keyword| haystack.contains(keyword))
        })
        .take(MAX_RESOURCES_PER_WORKER)
        .collect()
}

async fn invoke_operation(
    connection: &Connection,
    worker_id: &str,
    operation: &OperationInfo,
    args: Value,
) -> InvocationResult {
    let result = connection
        .request(
            "tools/call",
            serde_json::json!({ "name": operation.name, "arguments": args.clone() }),
        )
        .await;

    match result {
        Ok(value) => {
            let text = result_text(&value);
            let is_error = value
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_error {
                InvocationResult::failure(worker_id, &operation.name, args, text)
            } else {
                InvocationResult::success(worker_id, &operation.name, args, text)
            }
        }
        Err(e) => InvocationResult::failure(worker_id, &operation.name, args, e.to_string()),
    }
}

async fn read_resource(
    connection: &Connection,
    worker_id: &str,
    resource: &ResourceInfo,
) -> InvocationResult {
    let args = serde_json::json!({ "uri": resource.uri });
    let result = connection.request("resources/read", args.clone()).await;

    match result {
        Ok(value) => {
            let text = value
                .get("contents")
                .and_then(Value::as_array)
                .and_then(|contents| contents.first())
                .and_then(|content| content.get("text"))
                .and_then(Value::as_str)
                .map_or_else(|| value.to_string(), str::to_string);
            InvocationResult::success(worker_id, &resource.uri, args, text)
        }
        Err(e) => InvocationResult::failure(worker_id, &resource.uri, args, e.to_string()),
    }
}

/// Pull the human-readable text out of a `tools/call` result payload.
fn result_text(value: &Value) -> String {
    value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|content| content.first())
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .map_or_else(|| value.to_string(), str::to_string)
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}

fn compose(
    text: &str,
    tags: &[WorkerCategory],
    snapshot: HashMap<String, CapabilitySet>,
    invocations: Vec<InvocationResult>,
    reads: Vec<InvocationResult>,
) -> BridgeOutcome {
    if invocations.is_empty() && reads.is_empty() {
        let checked = if snapshot.is_empty() {
            "no ready workers were available to check".to_string()
        } else {
            let mut ids: Vec<&String> = snapshot.keys().collect();
            ids.sort();
            format!(
                "checked workers: {}",
                ids.iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        return BridgeOutcome {
            response: format!(
                "No matching capability was found among the checked workers for \"{text}\" ({checked})."
            ),
            workers: vec![],
            metadata: BridgeMetadata {
                tags: tags.to_vec(),
                capabilities: snapshot,
                invocations: vec![],
            },
        };
    }

    let mut sections: Vec<String> = Vec::new();

    let successes: Vec<&InvocationResult> = invocations.iter().filter(|i| i.success).collect();
    if !successes.is_empty() {
        let mut lines = vec!["Results:".to_string()];
        for invocation in &successes {
            lines.push(format!(
                "- {}/{}: {}",
                invocation.worker_id,
                invocation.operation,
                preview(&invocation.outcome)
            ));
        }
        sections.push(lines.join("\n"));
    }

    let failures: Vec<&InvocationResult> = invocations.iter().filter(|i| !i.success).collect();
    if !failures.is_empty() {
        let mut lines = vec!["Failures:".to_string()];
        for invocation in &failures {
            lines.push(format!(
                "- {}/{}: {}",
                invocation.worker_id, invocation.operation, invocation.outcome
            ));
        }
        sections.push(lines.join("\n"));
    }

    let read_successes: Vec<&InvocationResult> = reads.iter().filter(|r| r.success).collect();
    if !read_successes.is_empty() {
        let mut lines = vec!["Resources:".to_string()];
        for read in &read_successes {
            lines.push(format!(
                "- {}/{}: {}",
                read.worker_id,
                read.operation,
                preview(&read.outcome)
            ));
        }
        sections.push(lines.join("\n"));
    }

    // Workers that delivered at least one successful result.
    let mut workers: Vec<String> = successes
        .iter()
        .chain(read_successes.iter())
        .map(|i| i.worker_id.clone())
        .collect();
    workers.sort();
    workers.dedup();

    sections.push(if workers.is_empty() {
        "No worker produced a usable result.".to_string()
    } else {
        format!("Contributing workers: {}", workers.join(", "))
    });

    let mut all_invocations = invocations;
    all_invocations.extend(reads);

    BridgeOutcome {
        response: sections.join("\n\n"),
        workers,
        metadata: BridgeMetadata {
            tags: tags.to_vec(),
            capabilities: snapshot,
            invocations: all_invocations,
        },
    }
}
