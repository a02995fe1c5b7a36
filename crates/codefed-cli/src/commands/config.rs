//! Config command - View and manage configuration
//!
//! - Show the effective configuration, or one value of it
//! - Show configuration file paths
//! - Write a default configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use codefed_config::{ConfigLoader, FedConfig};
use serde::Serialize;

use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Show configuration file paths
    Path(PathArgs),

    /// Create a configuration file with defaults
    Init(InitArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Only this key (e.g., "search.max_matches")
    key: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create the global config (~/.codefed/config.toml) instead of the local one
    #[arg(long)]
    global: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Config file given with --config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit: Option<PathBuf>,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(
    cmd: ConfigCommand,
    config: Result<FedConfig>,
    global: GlobalOptions,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, config?),
        ConfigCommand::Path(args) => execute_path(args, global),
        ConfigCommand::Init(args) => execute_init(args),
    }
}

fn execute_show(args: ShowArgs, config: FedConfig) -> Result<()> {
    let Some(key) = args.key else {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            let text = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", text);
        }
        return Ok(());
    };

    let value = get_config_value(&config, &key)
        .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            serde_json::Value::Bool(b) => println!("{}", b),
            serde_json::Value::Number(n) => println!("{}", n),
            serde_json::Value::Null => println!("null"),
            other => println!("{}", serde_json::to_string_pretty(&other)?),
        }
    }

    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&cwd);

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().map(|p| p.exists()).unwrap_or(false),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
        explicit: global.config,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!("Configuration Paths");
    println!("===================\n");

    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        status(paths.local_exists)
    );
    if let Some(ref path) = paths.explicit {
        println!("--config: {} ({})", path.display(), status(path.exists()));
    }

    Ok(())
}

fn execute_init(args: InitArgs) -> Result<()> {
    let loader = ConfigLoader::new();

    let path = if args.global {
        loader
            .init_global()
            .context("Failed to create global config")?
    } else {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        loader
            .init_local(&cwd)
            .context("Failed to create local config")?
    };

    println!("Config: {}", path.display());
    Ok(())
}

fn status(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}

/// Get a configuration value by dotted key path.
///
/// Array elements are addressed by index, e.g. `backends.0.address`.
fn get_config_value(config: &FedConfig, key: &str) -> Option<serde_json::Value> {
    let json = serde_json::to_value(config).ok()?;

    let mut current = &json;
    for part in key.split('.') {
        current = match current {
            serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }

    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codefed_config::{BackendConfig, BackendKind};

    fn config() -> FedConfig {
        FedConfig {
            backends: vec![BackendConfig::new(
                "linux",
                "http://localhost:9999",
                BackendKind::Grpc,
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_get_config_value() {
        let config = config();

        assert_eq!(
            get_config_value(&config, "search.max_matches"),
            Some(serde_json::json!(200))
        );
        assert_eq!(
            get_config_value(&config, "logging.level"),
            Some(serde_json::json!("info"))
        );
        assert_eq!(
            get_config_value(&config, "backends.0.kind"),
            Some(serde_json::json!("grpc"))
        );
    }

    #[test]
    fn test_get_config_value_unknown() {
        let config = config();

        assert_eq!(get_config_value(&config, "search.nope"), None);
        assert_eq!(get_config_value(&config, "backends.3.id"), None);
        assert_eq!(get_config_value(&config, "backends.first.id"), None);
    }

    #[test]
    fn test_config_paths_serialize() {
        let paths = ConfigPaths {
            global: Some(PathBuf::from("/home/user/.codefed/config.toml")),
            local: PathBuf::from(".codefed/config.toml"),
            explicit: None,
            global_exists: true,
            local_exists: false,
        };

        let json = serde_json::to_value(&paths).unwrap();
        assert_eq!(json["global_exists"], true);
        assert_eq!(json["local"], ".codefed/config.toml");
        assert!(json.get("explicit").is_none());
    }
}
