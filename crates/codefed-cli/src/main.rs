//! codefed CLI - Query federated code search backends
//!
//! A command-line interface for searching one or more remote code search
//! engines through a single query model.
//!
//! # Usage
//!
//! ```bash
//! # Search the default backend
//! codefed search "spin_lock" --file '\.c$'
//!
//! # Search an engine that is not in the config
//! codefed --address http://localhost:6070 --kind trigram search "nginx"
//!
//! # Show the trees a backend indexes
//! codefed info --backend linux
//!
//! # List configured backends
//! codefed backends
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use codefed_config::{BackendConfig, BackendKind, ConfigOverrides, LogFormat, LoggingConfig};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod progress;

/// Backend id given to an engine passed with `--address`.
const ADHOC_BACKEND_ID: &str = "cli";

/// codefed - Federated code search
#[derive(Parser, Debug)]
#[command(name = "codefed")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Backend to use (id from the configuration)
    #[arg(long, short = 'b', global = true, env = "CODEFED_BACKEND")]
    backend: Option<String>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "CODEFED_CONFIG")]
    config: Option<PathBuf>,

    /// Address of an engine to use without configuring it
    #[arg(long, global = true, env = "CODEFED_ADDRESS")]
    address: Option<String>,

    /// Engine kind for --address (grpc, trigram)
    #[arg(
        long,
        global = true,
        default_value_t = BackendKind::Grpc,
        value_parser = parse_backend_kind
    )]
    kind: BackendKind,

    /// Seconds between metadata polls
    #[arg(long, global = true)]
    refresh_interval: Option<u64>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

/// Parse backend kind from string
fn parse_backend_kind(s: &str) -> Result<BackendKind, String> {
    s.parse().map_err(|e: codefed_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        let backend = self.address.as_ref().map(|address| {
            let id = self.backend.as_deref().unwrap_or(ADHOC_BACKEND_ID);
            BackendConfig::new(id, address, self.kind)
        });
        let default_backend = backend
            .as_ref()
            .map(|b| b.id.clone())
            .or_else(|| self.backend.clone());

        ConfigOverrides {
            default_backend,
            backend,
            refresh_interval_secs: self.refresh_interval,
            ..Default::default()
        }
    }

    /// Log level implied by --verbose/--quiet, if any
    fn log_level(&self) -> Option<&'static str> {
        if self.quiet {
            Some("error")
        } else if self.verbose {
            Some("debug")
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a backend
    Search(commands::search::SearchArgs),

    /// Show a backend's name, index time and trees
    Info(commands::info::InfoArgs),

    /// List configured backends
    Backends(commands::backends::BackendsArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise --verbose/--quiet, then the configured level.
fn init_tracing(global: &GlobalOptions, logging: &LoggingConfig) -> Result<()> {
    let level = global.log_level().unwrap_or(logging.level.as_str());
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::try_from_default_env().context("Invalid RUST_LOG")?,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
    };

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(logging.file.is_none());

    match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config errors surface from the commands that need a config; `config path`
    // and `config init` still work with a broken file.
    let config = commands::load_config(&cli.global);
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&cli.global, &logging)?;

    match cli.command {
        Commands::Search(args) => commands::search::execute(args, config?, cli.global).await,
        Commands::Info(args) => commands::info::execute(args, config?, cli.global).await,
        Commands::Backends(args) => commands::backends::execute(args, config?, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, config, cli.global).await,
    }
}
