//! Switchboard - Tool-Provider Process Orchestrator
//!
//! Switchboard manages a fleet of out-of-process "tool provider" workers
//! (filesystem, version control, databases, ...) speaking newline-delimited
//! JSON-RPC 2.0 over stdio, and routes free-text requests to the
//! operations those workers expose.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Catalog models, capability models, and the
//!   error taxonomy
//! - **Service Layer** (`services`): Lifecycle supervision, capability
//!   registry, catalog gateway, routing bridge
//! - **Infrastructure Layer** (`infrastructure`): JSON-RPC stdio transport,
//!   configuration, logging
//! - **CLI Layer** (`cli`): Command-line host application
//!
//! # Example
//!
//! ```ignore
//! use switchboard::services::{CapabilityRegistry, CatalogGateway, LifecycleManager, RoutingBridge};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build the stack, enable workers, route requests
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::error::{Result, SwitchboardError};
pub use domain::models::{
    BridgeOutcome, CapabilitySet, Config, InvocationResult, OperationInfo, ResourceInfo,
    RouteChunk, WorkerCategory, WorkerDescriptor,
};
pub use infrastructure::config::ConfigLoader;
pub use infrastructure::rpc::{Connection, ConnectionState};
pub use services::{CapabilityRegistry, CatalogGateway, LifecycleManager, RoutingBridge};
