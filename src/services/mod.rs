//! Service layer: lifecycle supervision, capability registry, catalog
//! gateway, and the tool-routing bridge.

pub mod bridge;
pub mod gateway;
pub mod lifecycle;
pub mod registry;

pub use bridge::RoutingBridge;
pub use gateway::CatalogGateway;
pub use lifecycle::LifecycleManager;
pub use registry::CapabilityRegistry;
