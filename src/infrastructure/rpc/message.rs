//! JSON-RPC 2.0 envelope types and line framing.
//!
//! Messages are newline-delimited JSON. Inbound bytes may arrive split
//! across I/O chunks, so [`FrameBuffer`] accumulates partial lines and
//! yields only complete ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request or notification envelope (outbound).
///
/// Notifications omit the correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// A call expecting a reply, correlated by `id`.
    pub fn call(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.to_string(),
            params: Some(params),
        }
    }

    /// A fire-and-forget notification.
    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params: Some(params),
        }
    }

    /// Serialize to one wire line (without the trailing newline).
    pub fn to_line(&self) -> String {
        // Envelope fields are plain strings/numbers; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// JSON-RPC 2.0 error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A parsed inbound message, classified by kind.
///
/// The closed set of variants keeps dispatch explicit: replies resolve
/// pending calls, notifications go to the fixed handler table, and
/// worker-initiated requests are acknowledged nowhere.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Reply to an outstanding call
    Reply {
        id: u64,
        result: Result<Value, JsonRpcError>,
    },
    /// Unsolicited worker-initiated message
    Notification { method: String, params: Value },
    /// Worker-initiated request (carries both id and method)
    Request { id: u64, method: String },
}

impl InboundMessage {
    /// Parse one complete line into a classified message.
    ///
    /// Returns `Err` for lines that are not well-formed envelopes; the
    /// caller logs and discards those without affecting the connection.
    pub fn parse(line: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| format!("invalid JSON: {e}"))?;

        let id = value.get("id").and_then(Value::as_u64);
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (id, method) {
            (Some(id), None) => {
                if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
                    let error: JsonRpcError = serde_json::from_value(error.clone())
                        .map_err(|e| format!("malformed error payload: {e}"))?;
                    Ok(Self::Reply {
                        id,
                        result: Err(error),
                    })
                } else {
                    let result = value.get("result").cloned().unwrap_or(Value::Null);
                    Ok(Self::Reply {
                        id,
                        result: Ok(result),
                    })
                }
            }
            (None, Some(method)) => {
                let params = value.get("params").cloned().unwrap_or(Value::Null);
                Ok(Self::Notification { method, params })
            }
            (Some(id), Some(method)) => Ok(Self::Request { id, method }),
            (None, None) => Err("envelope carries neither id nor method".to_string()),
        }
    }
}

/// Accumulates raw inbound bytes and yields complete newline-delimited lines.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it closed.
    ///
    /// Blank lines are skipped; trailing carriage returns are stripped.
    pub fn extend(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let text = text.trim_end_matches('\r').trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}
