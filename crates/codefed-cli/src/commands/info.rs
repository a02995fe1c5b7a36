//! Info command - Show what a backend indexes

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use codefed_backend::{IndexSnapshot, Tree};
use codefed_config::FedConfig;
use serde::Serialize;

use super::{create_registry, resolve_backend, wait_for_metadata};
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Seconds to wait for the first metadata refresh
    #[arg(long, default_value = "10")]
    wait: u64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct InfoOutput<'a> {
    id: &'a str,
    address: &'a str,
    kind: String,
    name: &'a str,
    index_time: Option<String>,
    trees: &'a [Tree],
}

/// Execute the info command
pub async fn execute(args: InfoArgs, config: FedConfig, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&config)?;
    let backend = resolve_backend(&registry, &global).await?;

    backend.start().await;
    let pb = progress::spinner(
        &format!("Fetching metadata from '{}'...", backend.id()),
        global.quiet,
    );
    let ready = wait_for_metadata(&backend, Duration::from_secs(args.wait)).await;
    if ready {
        progress::finish_spinner(pb, "Metadata received");
    } else {
        progress::finish_spinner_warn(pb, "No trees reported; showing defaults");
    }

    let snapshot = backend.snapshot().await;
    backend.shutdown().await;

    if args.json {
        let output = InfoOutput {
            id: backend.id(),
            address: backend.address(),
            kind: backend.kind().to_string(),
            name: &snapshot.name,
            index_time: snapshot.index_time.map(|t| t.to_rfc3339()),
            trees: &snapshot.trees,
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize info")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Backend: {} ({}, {})", backend.id(), backend.kind(), backend.address());
    for line in render_snapshot(&snapshot) {
        println!("{}", line);
    }
    Ok(())
}

fn render_snapshot(snapshot: &IndexSnapshot) -> Vec<String> {
    let mut out = vec![format!("Name: {}", snapshot.name)];
    out.push(match snapshot.index_time {
        Some(time) => format!("Indexed: {}", time.to_rfc3339()),
        None => "Indexed: unknown".to_string(),
    });

    out.push(format!("Trees ({}):", snapshot.trees.len()));
    for tree in snapshot.trees.iter() {
        let version = if tree.version.is_empty() {
            "-"
        } else {
            tree.version.as_str()
        };
        out.push(format!("  {} @ {}", tree.name, version));
        if !tree.url.is_empty() {
            out.push(format!("    {}", tree.url));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_snapshot_defaults() {
        let snapshot = IndexSnapshot {
            name: "linux".into(),
            trees: Vec::<Tree>::new().into(),
            index_time: None,
        };

        assert_eq!(
            render_snapshot(&snapshot),
            vec!["Name: linux", "Indexed: unknown", "Trees (0):"]
        );
    }

    #[test]
    fn test_render_snapshot_trees() {
        let snapshot = IndexSnapshot {
            name: "Linux".into(),
            trees: vec![
                Tree::new("linux", "v6.1", "https://git.example/{version}/{path}#L{lno}"),
                Tree::new("bare", "", ""),
            ]
            .into(),
            index_time: None,
        };

        let lines = render_snapshot(&snapshot);
        assert_eq!(lines[2], "Trees (2):");
        assert_eq!(lines[3], "  linux @ v6.1");
        assert_eq!(lines[4], "    https://git.example/{version}/{path}#L{lno}");
        assert_eq!(lines[5], "  bare @ -");
        assert_eq!(lines.len(), 6);
    }
}
