//! Command-line host application.
//!
//! The CLI is a thin session over the gateway: each invocation loads the
//! catalog, enables the workers it needs, performs one action, and tears
//! every worker down again before exiting.

pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{CapabilityRegistry, CatalogGateway, LifecycleManager, RoutingBridge};

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Tool-provider process orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to an explicit config file (default: .switchboard/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the worker catalog
    List(commands::catalog::ListArgs),
    /// Enable workers and show their ready status
    Status(commands::server::StatusArgs),
    /// Show the capability set of one worker
    Capabilities(commands::server::CapabilitiesArgs),
    /// Invoke one operation on one worker
    Invoke(commands::server::InvokeArgs),
    /// Measure a worker's health ping latency
    Ping(commands::server::PingArgs),
    /// Route a free-text request across enabled workers
    Route(commands::route::RouteArgs),
}

/// One CLI session: catalog gateway plus routing bridge over a shared
/// lifecycle manager.
pub struct Session {
    pub gateway: Arc<CatalogGateway>,
    pub bridge: RoutingBridge,
}

impl Session {
    pub fn from_config(config: Config) -> Self {
        let protocol = config.protocol.clone();
        let lifecycle = Arc::new(LifecycleManager::new(protocol.clone()));
        let registry = Arc::new(CapabilityRegistry::new(lifecycle.clone(), &protocol));
        let descriptors = config.workers.into_iter().map(Into::into).collect();
        let gateway = Arc::new(CatalogGateway::new(
            descriptors,
            lifecycle.clone(),
            registry.clone(),
        ));
        let bridge = RoutingBridge::new(lifecycle, registry);
        Self { gateway, bridge }
    }

    /// Tear down every worker this session started.
    pub async fn shutdown(&self) {
        self.gateway.shutdown_all().await;
    }
}

/// Load configuration, honoring an explicit `--config` path.
pub fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Parse repeated `KEY=VALUE` credential arguments.
pub fn parse_credentials(pairs: &[String]) -> anyhow::Result<std::collections::HashMap<String, String>> {
    let mut map = std::collections::HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            anyhow::bail!("invalid credential '{pair}', expected KEY=VALUE");
        };
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

/// Report a fatal error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "error": err.to_string() }));
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
