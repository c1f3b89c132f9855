//! JSON-RPC stdio transport to worker processes
//!
//! Newline-delimited JSON-RPC 2.0 over an ordered byte stream. One
//! [`connection::Connection`] per running worker owns the pending-call
//! table, the framing buffers, and the reader/writer/supervision tasks.

pub mod connection;
pub mod message;

pub use connection::{Connection, ConnectionState, WorkerEvent, PROTOCOL_VERSION};
pub use message::{FrameBuffer, InboundMessage, JsonRpcError, JsonRpcRequest};
