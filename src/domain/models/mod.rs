//! Domain models for the worker catalog, capabilities, and routing results.

pub mod capability;
pub mod config;
pub mod descriptor;
pub mod invocation;

pub use capability::{CapabilitySet, OperationInfo, ResourceInfo};
pub use config::{Config, LoggingConfig, ProtocolConfig, WorkerEntry};
pub use descriptor::{CredentialSpec, WorkerCategory, WorkerDescriptor};
pub use invocation::{BridgeMetadata, BridgeOutcome, InvocationResult, RouteChunk};
