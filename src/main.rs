//! Switchboard CLI entry point.

use clap::Parser;

use switchboard::cli::{Cli, Commands};
use switchboard::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = switchboard::cli::load_config(cli.config.as_ref())
        .map(|config| config.logging)
        .unwrap_or_default();
    if let Err(e) = init_logging(&logging) {
        eprintln!("warning: {e}");
    }

    let config = cli.config.as_ref();
    let result = match cli.command {
        Commands::List(args) => {
            switchboard::cli::commands::catalog::execute(args, cli.json, config).await
        }
        Commands::Status(args) => {
            switchboard::cli::commands::server::execute_status(args, cli.json, config).await
        }
        Commands::Capabilities(args) => {
            switchboard::cli::commands::server::execute_capabilities(args, cli.json, config).await
        }
        Commands::Invoke(args) => {
            switchboard::cli::commands::server::execute_invoke(args, cli.json, config).await
        }
        Commands::Ping(args) => {
            switchboard::cli::commands::server::execute_ping(args, cli.json, config).await
        }
        Commands::Route(args) => {
            switchboard::cli::commands::route::execute(args, cli.json, config).await
        }
    };

    if let Err(err) = result {
        switchboard::cli::handle_error(err, cli.json);
    }
}
