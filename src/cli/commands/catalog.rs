//! Catalog listing.

use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::cli::{load_config, Session};

#[derive(Args)]
pub struct ListArgs {}

pub async fn execute(_args: ListArgs, json: bool, config: Option<&std::path::PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let session = Session::from_config(config);

    let mut descriptors = session.gateway.list_descriptors();
    descriptors.sort_by(|a, b| a.id.cmp(&b.id));

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["id", "name", "category", "command", "credentials"]);
    for descriptor in descriptors {
        let command = descriptor
            .resolve_command()
            .map_or_else(|| "(unresolvable)".to_string(), |(cmd, _)| cmd);
        let credentials = descriptor
            .credentials
            .iter()
            .map(|c| {
                if c.required {
                    format!("{}*", c.name)
                } else {
                    c.name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            descriptor.id.clone(),
            descriptor.name.clone(),
            descriptor.category.to_string(),
            command,
            credentials,
        ]);
    }
    println!("{table}");
    Ok(())
}
