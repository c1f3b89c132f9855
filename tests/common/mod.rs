//! Common test utilities for integration tests
//!
//! Provides a scripted stub worker process, an in-memory wire harness for
//! driving a connection without any process, and shared fixtures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use switchboard::domain::models::{ProtocolConfig, WorkerCategory, WorkerDescriptor};
use switchboard::Connection;

/// A POSIX shell worker speaking just enough JSON-RPC for the tests:
/// initialize, ping, tools/list, resources/list, tools/call, and a
/// shutdown notification that makes it exit.
#[allow(dead_code)]
const STUB_WORKER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"notifications/'*)
      ;;
    *'"method":"shutdown"'*)
      exit 0
      ;;
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"stub-worker","version":"0.1.0"}}}\n' "$id"
      ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"read_file","description":"Read a file from disk","inputSchema":{"type":"object","properties":{"path":{"type":"string"}}}},{"name":"compile_report","description":"Build a report","inputSchema":{"type":"object","properties":{}}}]}}\n' "$id"
      ;;
    *'"method":"resources/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"resources":[]}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"stub result"}]}}\n' "$id"
      ;;
    *'"method":"ping"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id"
      ;;
    *)
      if [ -n "$id" ]; then
        printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id"
      fi
      ;;
  esac
done
"#;

/// Write the stub worker script into a temp directory.
///
/// Returns the directory (kept alive for the test's duration) and the
/// script path.
#[allow(dead_code)]
pub fn stub_worker_script() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("stub-worker.sh");
    std::fs::write(&path, STUB_WORKER).expect("Failed to write stub worker");
    (dir, path)
}

/// Descriptor launching the stub worker through `sh`.
#[allow(dead_code)]
pub fn stub_descriptor(id: &str, script: &Path) -> WorkerDescriptor {
    WorkerDescriptor {
        id: id.to_string(),
        name: format!("Stub {id}"),
        category: WorkerCategory::Filesystem,
        command: Some("sh".to_string()),
        args: vec![script.display().to_string()],
        env: HashMap::new(),
        working_dir: None,
        credentials: vec![],
        platforms: vec![],
        defaults: HashMap::new(),
    }
}

/// Protocol timings tightened for tests.
#[allow(dead_code)]
pub fn fast_protocol() -> ProtocolConfig {
    ProtocolConfig {
        request_timeout_secs: 2,
        settle_delay_ms: 50,
        stop_grace_secs: 2,
        ping_timeout_secs: 2,
    }
}

/// The far end of an in-memory connection: receives the client's parsed
/// requests and sends scripted reply lines. Dropping (or closing) the
/// harness closes the stream, which the connection observes as EOF.
#[allow(dead_code)]
pub struct WireHarness {
    requests: mpsc::UnboundedReceiver<Value>,
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[allow(dead_code)]
impl WireHarness {
    /// Next request or notification the client wrote, parsed.
    pub async fn next_request(&mut self) -> Value {
        self.requests
            .recv()
            .await
            .expect("client closed the wire before the expected request")
    }

    pub fn send_line(&self, line: &str) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(line.to_string());
        }
    }

    pub fn reply_ok(&self, id: u64, result: Value) {
        self.send_line(&json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string());
    }

    pub fn reply_err(&self, id: u64, code: i64, message: &str) {
        self.send_line(
            &json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
                .to_string(),
        );
    }

    pub fn notify(&self, method: &str, params: Value) {
        self.send_line(&json!({"jsonrpc": "2.0", "method": method, "params": params}).to_string());
    }

    /// Close the worker side of the stream, simulating a process exit.
    pub fn close(&mut self) {
        self.tx.take();
    }
}

/// Build a connection over an in-memory duplex stream plus the harness
/// driving its far end.
#[allow(dead_code)]
pub fn wire_connection(request_timeout: Duration) -> (Connection, WireHarness) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let connection =
        Connection::from_streams("test-worker", client_read, client_write, request_timeout);

    let (server_read, server_write) = tokio::io::split(server);

    let (request_tx, requests) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(server_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Ok(value) = serde_json::from_str::<Value>(&line) {
                let _ = request_tx.send(value);
            }
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut server_write = server_write;
        while let Some(line) = rx.recv().await {
            if server_write.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if server_write.write_all(b"\n").await.is_err() {
                break;
            }
        }
        // Explicitly shut down the write half so the client sees EOF even
        // while the paired read half is still held by the reader task.
        let _ = server_write.shutdown().await;
    });

    (connection, WireHarness { requests, tx: Some(tx) })
}

/// Drive the initialize/initialized handshake from both ends.
#[allow(dead_code)]
pub async fn complete_handshake(connection: &Connection, harness: &mut WireHarness) {
    let (handshake, ()) = tokio::join!(connection.handshake(), async {
        let request = harness.next_request().await;
        assert_eq!(request["method"], "initialize");
        let id = request["id"].as_u64().expect("initialize carries an id");
        harness.reply_ok(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "wire-stub", "version": "0.0.0"}
            }),
        );
    });
    handshake.expect("handshake failed");

    // Drain the initialized notification so callers see only their own
    // traffic afterwards.
    let note = harness.next_request().await;
    assert_eq!(note["method"], "notifications/initialized");
}
