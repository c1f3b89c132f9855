//! Worker session commands: status, capabilities, invoke, ping.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::cli::{load_config, parse_credentials, Session};

#[derive(Args)]
pub struct StatusArgs {
    /// Workers to enable for this session
    #[arg(long, value_delimiter = ',')]
    pub workers: Vec<String>,

    /// Credentials as repeated KEY=VALUE pairs
    #[arg(long = "credential")]
    pub credentials: Vec<String>,
}

pub async fn execute_status(
    args: StatusArgs,
    json: bool,
    config: Option<&std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    let session = Session::from_config(config);
    let credentials = parse_credentials(&args.credentials)?;

    for id in &args.workers {
        if let Err(e) = session.gateway.enable(id, &credentials).await {
            tracing::warn!(worker_id = %id, error = %e, "Failed to enable worker");
        }
    }

    let status = session.gateway.status().await;
    let outcome = if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["id", "ready"]);
        let mut ids: Vec<&String> = status.keys().collect();
        ids.sort();
        for id in ids {
            table.add_row(vec![id.clone(), status[id].to_string()]);
        }
        println!("{table}");
        Ok(())
    };

    session.shutdown().await;
    outcome
}

#[derive(Args)]
pub struct CapabilitiesArgs {
    /// Worker id
    pub id: String,

    /// Credentials as repeated KEY=VALUE pairs
    #[arg(long = "credential")]
    pub credentials: Vec<String>,
}

pub async fn execute_capabilities(
    args: CapabilitiesArgs,
    json: bool,
    config: Option<&std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    let session = Session::from_config(config);
    let credentials = parse_credentials(&args.credentials)?;

    let result = async {
        session.gateway.enable(&args.id, &credentials).await?;
        session
            .gateway
            .capabilities(&args.id)
            .await
            .context("no capabilities discovered")
    }
    .await;

    let outcome = match result {
        Ok(caps) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&caps)?);
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["kind", "name", "description"]);
                for op in &caps.operations {
                    table.add_row(vec![
                        "operation".to_string(),
                        op.name.clone(),
                        op.description.clone(),
                    ]);
                }
                for resource in &caps.resources {
                    table.add_row(vec![
                        "resource".to_string(),
                        resource.uri.clone(),
                        resource.name.clone(),
                    ]);
                }
                println!("{table}");
            }
            Ok(())
        }
        Err(e) => Err(e),
    };

    session.shutdown().await;
    outcome
}

#[derive(Args)]
pub struct InvokeArgs {
    /// Worker id
    pub id: String,

    /// Operation name
    pub operation: String,

    /// Operation arguments as a JSON object
    #[arg(long, default_value = "{}")]
    pub args: String,

    /// Credentials as repeated KEY=VALUE pairs
    #[arg(long = "credential")]
    pub credentials: Vec<String>,
}

pub async fn execute_invoke(
    args: InvokeArgs,
    _json: bool,
    config: Option<&std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    let session = Session::from_config(config);
    let credentials = parse_credentials(&args.credentials)?;
    let call_args: serde_json::Value =
        serde_json::from_str(&args.args).context("--args must be a JSON object")?;

    let result = async {
        session.gateway.enable(&args.id, &credentials).await?;
        session
            .gateway
            .invoke(&args.id, &args.operation, call_args)
            .await
            .map_err(anyhow::Error::from)
    }
    .await;

    let outcome = match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => Err(e),
    };

    session.shutdown().await;
    outcome
}

#[derive(Args)]
pub struct PingArgs {
    /// Worker id
    pub id: String,

    /// Credentials as repeated KEY=VALUE pairs
    #[arg(long = "credential")]
    pub credentials: Vec<String>,
}

pub async fn execute_ping(
    args: PingArgs,
    json: bool,
    config: Option<&std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    let session = Session::from_config(config);
    let credentials = parse_credentials(&args.credentials)?;

    let result = async {
        session.gateway.enable(&args.id, &credentials).await?;
        session.gateway.ping(&args.id).await.map_err(anyhow::Error::from)
    }
    .await;

    let outcome = match result {
        Ok(latency) => {
            let ms = latency.as_millis();
            if json {
                println!("{}", serde_json::json!({ "worker": args.id, "latency_ms": ms }));
            } else {
                println!("{}: {ms}ms", args.id);
            }
            Ok(())
        }
        Err(e) => Err(e),
    };

    session.shutdown().await;
    outcome
}
