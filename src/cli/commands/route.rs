//! Free-text request routing.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use crate::cli::{load_config, parse_credentials, Session};
use crate::domain::models::RouteChunk;

#[derive(Args)]
pub struct RouteArgs {
    /// The request text to route
    pub text: String,

    /// Workers to enable for this request
    #[arg(long, value_delimiter = ',')]
    pub workers: Vec<String>,

    /// Credentials as repeated KEY=VALUE pairs, shared by all workers
    #[arg(long = "credential")]
    pub credentials: Vec<String>,

    /// Print the response incrementally as it is composed
    #[arg(long)]
    pub stream: bool,
}

pub async fn execute(args: RouteArgs, json: bool, config: Option<&std::path::PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let session = Session::from_config(config);
    let credentials = parse_credentials(&args.credentials)?;

    // A worker that fails to enable degrades the answer instead of
    // aborting the request; the bridge only routes to ready workers.
    let mut enabled = Vec::new();
    for id in &args.workers {
        match session.gateway.enable(id, &credentials).await {
            Ok(()) => enabled.push(id.clone()),
            Err(e) => tracing::warn!(worker_id = %id, error = %e, "Failed to enable worker"),
        }
    }

    let outcome = if args.stream {
        session
            .bridge
            .stream_route(&args.text, &enabled, |chunk| match chunk {
                RouteChunk::Text(text) => {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                RouteChunk::Done => println!(),
            })
            .await
    } else {
        session.bridge.route(&args.text, &enabled).await
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if !args.stream {
        println!("{}", outcome.response);
    }

    session.shutdown().await;
    Ok(())
}
