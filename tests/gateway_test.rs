//! Gateway and lifecycle integration tests against a scripted stub worker
//! process.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{fast_protocol, stub_descriptor, stub_worker_script};
use switchboard::domain::models::{CredentialSpec, WorkerDescriptor};
use switchboard::{CapabilityRegistry, CatalogGateway, LifecycleManager, SwitchboardError};

fn build_gateway(
    descriptors: Vec<WorkerDescriptor>,
) -> (Arc<LifecycleManager>, Arc<CatalogGateway>) {
    let protocol = fast_protocol();
    let lifecycle = Arc::new(LifecycleManager::new(protocol.clone()));
    let registry = Arc::new(CapabilityRegistry::new(lifecycle.clone(), &protocol));
    let gateway = Arc::new(CatalogGateway::new(descriptors, lifecycle.clone(), registry));
    (lifecycle, gateway)
}

#[tokio::test]
async fn test_enable_reaches_ready_and_disable_clears_it() {
    let (_dir, script) = stub_worker_script();
    let (lifecycle, gateway) = build_gateway(vec![stub_descriptor("fs-worker", &script)]);

    gateway
        .enable("fs-worker", &HashMap::new())
        .await
        .expect("enable failed");

    let status = gateway.status().await;
    assert_eq!(status.get("fs-worker"), Some(&true));
    assert_eq!(gateway.enabled_ids().await, vec!["fs-worker".to_string()]);

    // Capabilities were discovered during enable.
    let caps = gateway.capabilities("fs-worker").await.unwrap();
    assert!(caps.operations.iter().any(|op| op.name == "read_file"));

    let pid = lifecycle
        .connection("fs-worker")
        .await
        .and_then(|c| c.pid())
        .expect("live connection has a pid");

    gateway.disable("fs-worker").await;

    let status = gateway.status().await;
    assert_eq!(status.get("fs-worker"), Some(&false));
    assert!(gateway.enabled_ids().await.is_empty());
    assert!(gateway.capabilities("fs-worker").await.is_none());
    assert!(lifecycle.connection("fs-worker").await.is_none());

    // The OS process is gone; signalling pid 0 membership now fails.
    #[allow(clippy::cast_possible_wrap)]
    let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok();
    assert!(!alive, "worker process survived disable");
}

#[tokio::test]
async fn test_enable_with_missing_credential_starts_nothing() {
    let (_dir, script) = stub_worker_script();
    let mut descriptor = stub_descriptor("api-worker", &script);
    descriptor.credentials = vec![CredentialSpec {
        name: "API_KEY".to_string(),
        required: true,
    }];
    let (lifecycle, gateway) = build_gateway(vec![descriptor]);

    let result = gateway.enable("api-worker", &HashMap::new()).await;
    assert!(matches!(
        result,
        Err(SwitchboardError::MissingCredential { ref name, .. }) if name == "API_KEY"
    ));

    assert_eq!(gateway.status().await.get("api-worker"), Some(&false));
    assert!(gateway.enabled_ids().await.is_empty());
    assert!(lifecycle.connection("api-worker").await.is_none());
}

#[tokio::test]
async fn test_enable_with_supplied_credential_succeeds() {
    let (_dir, script) = stub_worker_script();
    let mut descriptor = stub_descriptor("api-worker", &script);
    descriptor.credentials = vec![CredentialSpec {
        name: "API_KEY".to_string(),
        required: true,
    }];
    let (_lifecycle, gateway) = build_gateway(vec![descriptor]);

    let mut credentials = HashMap::new();
    credentials.insert("API_KEY".to_string(), "secret".to_string());
    gateway
        .enable("api-worker", &credentials)
        .await
        .expect("enable with credential failed");

    assert_eq!(gateway.status().await.get("api-worker"), Some(&true));
    gateway.disable("api-worker").await;
}

#[tokio::test]
async fn test_invoke_and_ping_round_trip() {
    let (_dir, script) = stub_worker_script();
    let (_lifecycle, gateway) = build_gateway(vec![stub_descriptor("fs-worker", &script)]);

    gateway
        .enable("fs-worker", &HashMap::new())
        .await
        .expect("enable failed");

    let result = gateway
        .invoke("fs-worker", "read_file", serde_json::json!({ "path": "a.txt" }))
        .await
        .expect("invoke failed");
    assert_eq!(result["content"][0]["text"], "stub result");

    let latency = gateway.ping("fs-worker").await.expect("ping failed");
    assert!(latency.as_secs() < 2);

    gateway.disable("fs-worker").await;
}

#[tokio::test]
async fn test_enable_failure_leaves_worker_disabled() {
    let mut descriptor = stub_descriptor("broken-worker", std::path::Path::new("/dev/null"));
    descriptor.command = Some("/nonexistent/worker-binary".to_string());
    let (_lifecycle, gateway) = build_gateway(vec![descriptor]);

    let result = gateway.enable("broken-worker", &HashMap::new()).await;
    assert!(matches!(result, Err(SwitchboardError::StartFailed(_))));
    assert_eq!(gateway.status().await.get("broken-worker"), Some(&false));
    assert!(gateway.enabled_ids().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_all_stops_every_worker() {
    let (_dir, script) = stub_worker_script();
    let (_lifecycle, gateway) = build_gateway(vec![
        stub_descriptor("worker-a", &script),
        stub_descriptor("worker-b", &script),
    ]);

    gateway.enable("worker-a", &HashMap::new()).await.unwrap();
    gateway.enable("worker-b", &HashMap::new()).await.unwrap();
    assert_eq!(gateway.enabled_ids().await.len(), 2);

    gateway.shutdown_all().await;

    let status = gateway.status().await;
    assert_eq!(status.get("worker-a"), Some(&false));
    assert_eq!(status.get("worker-b"), Some(&false));
    assert!(gateway.enabled_ids().await.is_empty());
}
