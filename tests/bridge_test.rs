//! End-to-end routing tests: free text in, combined answer out, against a
//! scripted stub worker process.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{fast_protocol, stub_descriptor, stub_worker_script};
use switchboard::{CapabilityRegistry, CatalogGateway, LifecycleManager, RouteChunk, RoutingBridge};

struct Stack {
    gateway: Arc<CatalogGateway>,
    bridge: RoutingBridge,
}

fn build_stack(descriptors: Vec<switchboard::WorkerDescriptor>) -> Stack {
    let protocol = fast_protocol();
    let lifecycle = Arc::new(LifecycleManager::new(protocol.clone()));
    let registry = Arc::new(CapabilityRegistry::new(lifecycle.clone(), &protocol));
    let gateway = Arc::new(CatalogGateway::new(
        descriptors,
        lifecycle.clone(),
        registry.clone(),
    ));
    let bridge = RoutingBridge::new(lifecycle, registry);
    Stack { gateway, bridge }
}

#[tokio::test]
async fn test_route_selects_matching_operation_and_extracts_path() {
    let (_dir, script) = stub_worker_script();
    let stack = build_stack(vec![stub_descriptor("fs-worker", &script)]);
    stack
        .gateway
        .enable("fs-worker", &HashMap::new())
        .await
        .expect("enable failed");

    let outcome = stack
        .bridge
        .route("read file \"readme.txt\"", &["fs-worker".to_string()])
        .await;

    assert_eq!(outcome.workers, vec!["fs-worker".to_string()]);
    assert!(outcome.response.contains("fs-worker/read_file"));
    assert!(outcome.response.contains("stub result"));

    // The quoted substring became the path argument.
    let invocation = outcome
        .metadata
        .invocations
        .iter()
        .find(|i| i.operation == "read_file")
        .expect("read_file was invoked");
    assert_eq!(invocation.arguments["path"], "readme.txt");
    assert!(invocation.success);

    // The non-matching operation was not selected.
    assert!(!outcome
        .metadata
        .invocations
        .iter()
        .any(|i| i.operation == "compile_report"));

    stack.gateway.shutdown_all().await;
}

#[tokio::test]
async fn test_route_with_no_workers_states_no_capability() {
    let stack = build_stack(vec![]);

    let outcome = stack.bridge.route("read the file \"a.txt\"", &[]).await;
    assert!(outcome.workers.is_empty());
    assert!(outcome.response.contains("No matching capability"));
}

#[tokio::test]
async fn test_route_skips_workers_that_are_not_ready() {
    let (_dir, script) = stub_worker_script();
    let stack = build_stack(vec![stub_descriptor("fs-worker", &script)]);
    // Never enabled: the bridge must not invoke anything against it.
    let outcome = stack
        .bridge
        .route("read file \"readme.txt\"", &["fs-worker".to_string()])
        .await;
    assert!(outcome.workers.is_empty());
    assert!(outcome.metadata.invocations.is_empty());
    assert!(outcome.response.contains("No matching capability"));
}

#[tokio::test]
async fn test_route_tolerates_one_worker_failing() {
    let (_dir, script) = stub_worker_script();
    let stack = build_stack(vec![
        stub_descriptor("fs-a", &script),
        stub_descriptor("fs-b", &script),
    ]);
    stack.gateway.enable("fs-a", &HashMap::new()).await.unwrap();
    stack.gateway.enable("fs-b", &HashMap::new()).await.unwrap();

    // Kill b's process out from under the bridge.
    stack.gateway.disable("fs-b").await;

    let outcome = stack
        .bridge
        .route(
            "read file \"readme.txt\"",
            &["fs-a".to_string(), "fs-b".to_string()],
        )
        .await;

    // a still contributes; b's absence degrades nothing else.
    assert_eq!(outcome.workers, vec!["fs-a".to_string()]);
    assert!(outcome.response.contains("fs-a/read_file"));

    stack.gateway.shutdown_all().await;
}

#[tokio::test]
async fn test_stream_route_delivers_chunks_then_sentinel() {
    let (_dir, script) = stub_worker_script();
    let stack = build_stack(vec![stub_descriptor("fs-worker", &script)]);
    stack
        .gateway
        .enable("fs-worker", &HashMap::new())
        .await
        .expect("enable failed");

    let mut chunks = Vec::new();
    let outcome = stack
        .bridge
        .stream_route("read file \"readme.txt\"", &["fs-worker".to_string()], |chunk| {
            chunks.push(chunk);
        })
        .await;

    assert_eq!(chunks.last(), Some(&RouteChunk::Done));
    let streamed: String = chunks
        .iter()
        .filter_map(|chunk| match chunk {
            RouteChunk::Text(text) => Some(text.as_str()),
            RouteChunk::Done => None,
        })
        .collect();
    // Every section of the composed response went out as a chunk.
    for line in outcome.response.lines().filter(|l| !l.is_empty()) {
        assert!(streamed.contains(line), "missing streamed line: {line}");
    }

    stack.gateway.shutdown_all().await;
}
