//! One connection per running worker process.
//!
//! Owns the pending-call table, the framing buffers, and the four
//! supervision tasks (writer, stdout reader, stderr reader, exit watcher).
//! Replies are matched to callers purely by correlation id, so any number
//! of calls may be in flight at once (pipelining).
//!
//! The single most important correctness property lives here: when the
//! process exits or the stream closes, every pending call is failed with
//! a connection-lost outcome instead of being left to time out.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::domain::error::{Result, SwitchboardError};
use crate::infrastructure::rpc::message::{FrameBuffer, InboundMessage, JsonRpcError, JsonRpcRequest};

/// Protocol version declared during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const OUTBOUND_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 64;
const READ_CHUNK: usize = 4096;

/// Lifecycle state of one connection instance.
///
/// `Stopped` is terminal; a restarted worker gets a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Starting,
    Initializing,
    Ready,
    Degraded,
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Starting => "starting",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::Stopped => "stopped",
        };
        write!(f, "{label}")
    }
}

/// A progress or log notification forwarded from the worker to observers.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub worker_id: String,
    pub method: String,
    pub params: Value,
}

struct PendingCall {
    issued_at: Instant,
    resolver: oneshot::Sender<Result<Value>>,
}

struct Shared {
    worker_id: String,
    state: RwLock<ConnectionState>,
    pending: Mutex<HashMap<u64, PendingCall>>,
    events: broadcast::Sender<WorkerEvent>,
    last_ping: RwLock<Option<Instant>>,
}

impl Shared {
    async fn handle_line(&self, line: &str) {
        let message = match InboundMessage::parse(line) {
            Ok(message) => message,
            Err(reason) => {
                // Malformed lines are dropped; they must never take the
                // connection down or block the lines behind them.
                warn!(
                    worker_id = %self.worker_id,
                    %reason,
                    "Discarding unparseable line from worker"
                );
                return;
            }
        };

        match message {
            InboundMessage::Reply { id, result } => self.resolve_pending(id, result).await,
            InboundMessage::Notification { method, params } => {
                self.handle_notification(&method, params).await;
            }
            InboundMessage::Request { id, method } => {
                debug!(
                    worker_id = %self.worker_id,
                    correlation_id = id,
                    %method,
                    "Ignoring worker-initiated request"
                );
            }
        }
    }

    async fn resolve_pending(&self, id: u64, result: std::result::Result<Value, JsonRpcError>) {
        let entry = self.pending.lock().await.remove(&id);
        let Some(call) = entry else {
            // Timed out, torn down, or never issued; late replies are not
            // allowed to resurrect a removed call.
            debug!(
                worker_id = %self.worker_id,
                correlation_id = id,
                "Discarding reply with no pending call"
            );
            return;
        };

        let outcome = result.map_err(|e| SwitchboardError::Remote {
            code: e.code,
            message: e.message,
        });
        let _ = call.resolver.send(outcome);
    }

    async fn handle_notification(&self, method: &str, params: Value) {
        match method {
            "notifications/initialized" => {
                let mut state = self.state.write().await;
                if *state == ConnectionState::Initializing {
                    *state = ConnectionState::Ready;
                    info!(worker_id = %self.worker_id, "Worker signalled initialized");
                }
            }
            "notifications/progress" | "notifications/message" => {
                let _ = self.events.send(WorkerEvent {
                    worker_id: self.worker_id.clone(),
                    method: method.to_string(),
                    params,
                });
            }
            other => {
                debug!(
                    worker_id = %self.worker_id,
                    method = %other,
                    "Unhandled notification from worker"
                );
            }
        }
    }

    /// Fail every pending call and mark the connection stopped.
    ///
    /// Idempotent: the second invocation finds an empty table and a
    /// terminal state.
    async fn teardown(&self) {
        {
            let mut state = self.state.write().await;
            *state = ConnectionState::Stopped;
        }

        let drained: Vec<(u64, PendingCall)> =
            self.pending.lock().await.drain().collect();
        if !drained.is_empty() {
            warn!(
                worker_id = %self.worker_id,
                count = drained.len(),
                "Failing pending calls after connection loss"
            );
        }
        for (id, call) in drained {
            debug!(
                worker_id = %self.worker_id,
                correlation_id = id,
                in_flight_ms = call.issued_at.elapsed().as_millis() as u64,
                "Resolving pending call as connection lost"
            );
            let _ = call
                .resolver
                .send(Err(SwitchboardError::ConnectionLost(self.worker_id.clone())));
        }
    }
}

/// A live JSON-RPC connection to one worker.
pub struct Connection {
    shared: Arc<Shared>,
    outbound_tx: mpsc::Sender<String>,
    next_id: AtomicU64,
    request_timeout: Duration,
    pid: Option<u32>,
    stopping: Arc<AtomicBool>,
    exited_tx: watch::Sender<bool>,
    exited_rx: watch::Receiver<bool>,
}

impl Connection {
    /// Spawn a worker process and wire its standard streams in.
    ///
    /// The returned connection is in `Starting` state; run
    /// [`Connection::handshake`] before issuing user-level calls.
    pub fn spawn(
        worker_id: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&str>,
        request_timeout: Duration,
    ) -> std::io::Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::other("child stdin was not captured")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::other("child stdout was not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            std::io::Error::other("child stderr was not captured")
        })?;

        let pid = child.id();
        let mut connection = Self::build(worker_id, stdout, stdin, request_timeout);
        connection.pid = pid;

        // Drain stderr so the worker never blocks on a full pipe; lines
        // surface through logging only.
        {
            let shared = connection.shared.clone();
            tokio::spawn(async move {
                let mut buffer = FrameBuffer::new();
                let mut stderr = stderr;
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match stderr.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            for line in buffer.extend(&chunk[..n]) {
                                debug!(worker_id = %shared.worker_id, %line, "worker stderr");
                            }
                        }
                    }
                }
            });
        }

        // Exit watcher: owns the child. On exit (expected or not) the
        // pending table is drained and the state goes terminal. Forced
        // kills are delivered by signal from outside, so waiting is all
        // this task does.
        {
            let shared = connection.shared.clone();
            let stopping = connection.stopping.clone();
            let exited_tx = connection.exited_tx.clone();
            tokio::spawn(async move {
                let status = child.wait().await;

                match status {
                    Ok(status) if stopping.load(Ordering::SeqCst) => {
                        info!(worker_id = %shared.worker_id, ?status, "Worker exited");
                    }
                    Ok(status) => {
                        warn!(
                            worker_id = %shared.worker_id,
                            ?status,
                            "Worker exited unexpectedly"
                        );
                    }
                    Err(ref e) => {
                        warn!(worker_id = %shared.worker_id, error = %e, "Failed to reap worker");
                    }
                }

                shared.teardown().await;
                let _ = exited_tx.send(true);
            });
        }

        Ok(connection)
    }

    /// Build a connection over arbitrary byte streams.
    ///
    /// The wire contract only needs an ordered byte stream with newline
    /// framing; in-memory transports and tests use this directly. Stream
    /// EOF triggers the same teardown as a process exit.
    pub fn from_streams<R, W>(worker_id: &str, reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::build(worker_id, reader, writer, request_timeout)
    }

    fn build<R, W>(worker_id: &str, reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let shared = Arc::new(Shared {
            worker_id: worker_id.to_string(),
            state: RwLock::new(ConnectionState::Starting),
            pending: Mutex::new(HashMap::new()),
            events,
            last_ping: RwLock::new(None),
        });

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let (exited_tx, exited_rx) = watch::channel(false);

        // Writer task: single owner of the outbound stream.
        {
            let shared = shared.clone();
            let mut writer = writer;
            tokio::spawn(async move {
                while let Some(line) = outbound_rx.recv().await {
                    let write = async {
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await
                    };
                    if let Err(e) = write.await {
                        warn!(worker_id = %shared.worker_id, error = %e, "Write to worker failed");
                        break;
                    }
                }
            });
        }

        // Reader task: frame, parse, dispatch. EOF means the far side is
        // gone; drain pending calls instead of leaving them to time out.
        {
            let shared = shared.clone();
            let exited_tx = exited_tx.clone();
            let mut reader = reader;
            tokio::spawn(async move {
                let mut buffer = FrameBuffer::new();
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            for line in buffer.extend(&chunk[..n]) {
                                shared.handle_line(&line).await;
                            }
                        }
                        Err(e) => {
                            warn!(worker_id = %shared.worker_id, error = %e, "Read from worker failed");
                            break;
                        }
                    }
                }
                shared.teardown().await;
                let _ = exited_tx.send(true);
            });
        }

        Self {
            shared,
            outbound_tx,
            next_id: AtomicU64::new(1),
            request_timeout,
            pid: None,
            stopping: Arc::new(AtomicBool::new(false)),
            exited_tx,
            exited_rx,
        }
    }

    /// Worker id this connection belongs to.
    pub fn worker_id(&self) -> &str {
        &self.shared.worker_id
    }

    /// OS process id, when this connection wraps a spawned process.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.shared.state.read().await
    }

    /// Number of calls still awaiting replies.
    pub async fn pending_count(&self) -> usize {
        self.shared.pending.lock().await.len()
    }

    /// Subscribe to forwarded progress/log notifications.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.shared.events.subscribe()
    }

    /// Record a successful health ping; `Degraded` returns to `Ready`.
    pub async fn record_ping_success(&self) {
        *self.shared.last_ping.write().await = Some(Instant::now());
        let mut state = self.shared.state.write().await;
        if *state == ConnectionState::Degraded {
            *state = ConnectionState::Ready;
            info!(worker_id = %self.shared.worker_id, "Worker recovered from degraded state");
        }
    }

    /// Record a failed health ping; `Ready` drops to `Degraded` but the
    /// connection stays up.
    pub async fn record_ping_failure(&self) {
        let mut state = self.shared.state.write().await;
        if *state == ConnectionState::Ready {
            *state = ConnectionState::Degraded;
            warn!(worker_id = %self.shared.worker_id, "Worker degraded after failed ping");
        }
    }

    /// Age of the last successful ping, if any.
    pub async fn last_ping_age(&self) -> Option<Duration> {
        self.shared.last_ping.read().await.map(|at| at.elapsed())
    }

    /// Issue a user-level call. Fails fast with `NotConnected` unless the
    /// connection is `Ready` (or `Degraded`: still alive, still usable).
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        match self.state().await {
            ConnectionState::Ready | ConnectionState::Degraded => {}
            _ => {
                return Err(SwitchboardError::NotConnected(
                    self.shared.worker_id.clone(),
                ))
            }
        }
        self.raw_request(method, params).await
    }

    /// Issue a call without the readiness gate (handshake traffic).
    async fn raw_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        // The pending entry must exist before the bytes go out, or a fast
        // reply could race the insert.
        self.shared.pending.lock().await.insert(
            id,
            PendingCall {
                issued_at: Instant::now(),
                resolver: tx,
            },
        );

        let line = JsonRpcRequest::call(id, method, params).to_line();
        if self.outbound_tx.send(line).await.is_err() {
            self.shared.pending.lock().await.remove(&id);
            return Err(SwitchboardError::ConnectionLost(
                self.shared.worker_id.clone(),
            ));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SwitchboardError::ConnectionLost(
                self.shared.worker_id.clone(),
            )),
            Err(_) => {
                // Remove the entry so a late reply is discarded rather than
                // resurrecting the call.
                self.shared.pending.lock().await.remove(&id);
                Err(SwitchboardError::Timeout {
                    method: method.to_string(),
                    timeout_secs: self.request_timeout.as_secs(),
                })
            }
        }
    }

    /// Send a fire-and-forget notification.
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let line = JsonRpcRequest::notification(method, params).to_line();
        self.outbound_tx
            .send(line)
            .await
            .map_err(|_| SwitchboardError::ConnectionLost(self.shared.worker_id.clone()))
    }

    /// Run the initialize/initialized handshake.
    ///
    /// Only after this completes may the connection carry user-level calls.
    pub async fn handshake(&self) -> Result<()> {
        {
            let mut state = self.shared.state.write().await;
            if *state == ConnectionState::Stopped {
                return Err(SwitchboardError::NotConnected(
                    self.shared.worker_id.clone(),
                ));
            }
            *state = ConnectionState::Initializing;
        }

        let result = self
            .raw_request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "switchboard",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;

        let server_info = result.get("serverInfo").cloned().unwrap_or(Value::Null);
        debug!(
            worker_id = %self.shared.worker_id,
            server_info = %server_info,
            "Initialize handshake accepted"
        );

        self.notify("notifications/initialized", json!({})).await?;

        let mut state = self.shared.state.write().await;
        if *state == ConnectionState::Initializing {
            *state = ConnectionState::Ready;
        }
        info!(worker_id = %self.shared.worker_id, "Connection ready");
        Ok(())
    }

    /// Mark that a stop was requested, so the exit watcher logs the exit
    /// as expected rather than as a crash.
    pub fn mark_stopping(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Wait until the process (or stream) is confirmed gone.
    ///
    /// Returns `true` if it exited within the grace window.
    pub async fn wait_exited(&self, grace: Duration) -> bool {
        let mut rx = self.exited_rx.clone();
        if *rx.borrow() {
            return true;
        }
        tokio::time::timeout(grace, async {
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    break;
                }
            }
        })
        .await
        .is_ok()
    }

    /// Drain pending calls and go terminal without touching the process.
    ///
    /// Used by teardown paths that manage the process separately.
    pub async fn abort_pending(&self) {
        self.shared.teardown().await;
    }
}
