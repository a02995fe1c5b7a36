//! CLI command implementations

pub mod backends;
pub mod config;
pub mod info;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use codefed_backend::{Backend, BackendRegistry};
use codefed_config::{ConfigLoader, FedConfig};
use tokio::time::Instant;

use crate::GlobalOptions;

/// Load configuration with optional config file override.
///
/// With `--config`, only that file is read. Otherwise global and local
/// configs are merged for the current directory. CLI overrides apply last.
pub fn load_config(global: &GlobalOptions) -> Result<FedConfig> {
    let overrides = global.to_config_overrides();
    let loader = ConfigLoader::new();

    if let Some(ref config_path) = global.config {
        let mut config = loader
            .load_file(config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?;
        config.apply_overrides(&overrides);
        config.validate().context("Invalid configuration")?;
        return Ok(config);
    }

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    loader
        .load(&cwd, Some(&overrides))
        .context("Failed to load configuration")
}

/// Build the backend registry from configuration.
pub fn create_registry(config: &FedConfig) -> Result<BackendRegistry> {
    BackendRegistry::from_config(config).context("Failed to create backends")
}

/// Resolve the backend named on the command line, else the default one.
pub async fn resolve_backend(
    registry: &BackendRegistry,
    global: &GlobalOptions,
) -> Result<Arc<Backend>> {
    if registry.is_empty().await {
        anyhow::bail!(
            "No backends configured. Add one with [[backends]] in the config file or pass --address"
        );
    }
    registry
        .resolve(global.backend.as_deref())
        .await
        .context("Failed to select backend")
}

/// Wait until a started backend reports its trees.
///
/// Returns false when nothing arrived within `timeout`.
pub async fn wait_for_metadata(backend: &Backend, timeout: Duration) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if !backend.info().trees().await.is_empty() {
            return true;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

/// Print a warning message to stderr.
pub fn print_warning(message: &str) {
    eprintln!("warning: {}", message);
}
