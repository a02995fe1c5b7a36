//! Backends command - List configured backends

use anyhow::{Context, Result};
use clap::Args;
use codefed_backend::BackendInfo;
use codefed_config::FedConfig;

use super::{create_registry, print_info};
use crate::GlobalOptions;

/// Arguments for the backends command
#[derive(Args, Debug)]
pub struct BackendsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the backends command
pub async fn execute(args: BackendsArgs, config: FedConfig, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&config)?;
    let backends = registry.list().await;
    let default_id = config.default_backend_id();

    if args.json {
        let json = serde_json::to_string_pretty(&backends).context("Failed to serialize backends")?;
        println!("{}", json);
        return Ok(());
    }

    if backends.is_empty() {
        print_info(
            "No backends configured. Add [[backends]] to the config or pass --address.",
            global.quiet,
        );
        return Ok(());
    }

    for line in render_table(&backends, default_id) {
        println!("{}", line);
    }
    Ok(())
}

fn render_table(backends: &[BackendInfo], default_id: Option<&str>) -> Vec<String> {
    let id_width = backends.iter().map(|b| b.id.len()).max().unwrap_or(0).max(2);

    backends
        .iter()
        .map(|b| {
            let marker = if Some(b.id.as_str()) == default_id {
                "*"
            } else {
                " "
            };
            format!(
                "{} {:<width$}  {:<7}  {}",
                marker,
                b.id,
                b.kind.to_string(),
                b.address,
                width = id_width
            )
        })
        .collect()
}
