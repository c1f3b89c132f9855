//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty formatting
//! - EnvFilter-based level control
//! - stderr output so stdout stays free for command results

pub mod logger;

pub use logger::init_logging;
