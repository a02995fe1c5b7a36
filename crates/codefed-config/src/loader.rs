//! Layered configuration loading.
//!
//! A config is assembled from up to three layers, each applied over the
//! previous one:
//! 1. Global file: `~/.codefed/config.toml`
//! 2. Local file: `.codefed/config.toml` under the working directory
//! 3. CLI overrides
//!
//! Files are read as `ConfigLayer`s whose keys are all optional, so a file
//! only changes what it actually sets. Backends merge by id.

use crate::error::ConfigError;
use crate::{BackendConfig, ConfigOverrides, FedConfig, LogFormat};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CONFIG_DIR: &str = ".codefed";
const CONFIG_FILE: &str = "config.toml";

/// Written by `init_*`. Parses to the built-in defaults.
const STARTER_CONFIG: &str = r#"# codefed configuration
#
# default_backend = "linux"
#
# [[backends]]
# id = "linux"
# address = "http://localhost:9999"
# kind = "grpc"
#
# [[backends]]
# id = "oss"
# address = "http://localhost:6070"
# kind = "trigram"

[search]
context_lines = 3
max_matches = 200
timeout_secs = 30

[refresh]
interval_secs = 60

[logging]
level = "info"
format = "text"
"#;

/// One config file as written: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    default_backend: Option<String>,
    search: SearchLayer,
    refresh: RefreshLayer,
    logging: LoggingLayer,
    backends: Vec<BackendConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchLayer {
    context_lines: Option<u32>,
    max_matches: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RefreshLayer {
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingLayer {
    level: Option<String>,
    format: Option<LogFormat>,
    file: Option<PathBuf>,
}

impl ConfigLayer {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io("read", path, e))?;
        toml::from_str(&text).map_err(|source| ConfigError::Syntax {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path` if it exists.
    fn read_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.is_file() {
            trace!(path = %path.display(), "no config file");
            return Ok(None);
        }
        debug!(path = %path.display(), "loading config file");
        Self::read(path).map(Some)
    }

    fn apply_to(self, config: &mut FedConfig) {
        set(&mut config.default_backend, self.default_backend.map(Some));

        set(&mut config.search.context_lines, self.search.context_lines);
        set(&mut config.search.max_matches, self.search.max_matches);
        set(&mut config.search.timeout_secs, self.search.timeout_secs);

        set(&mut config.refresh.interval_secs, self.refresh.interval_secs);

        set(&mut config.logging.level, self.logging.level);
        set(&mut config.logging.format, self.logging.format);
        set(&mut config.logging.file, self.logging.file.map(Some));

        for backend in self.backends {
            match config.backends.iter_mut().find(|b| b.id == backend.id) {
                Some(existing) => *existing = backend,
                None => config.backends.push(backend),
            }
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Finds and layers config files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directory holding the global config (`~/.codefed`)
    global_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader whose global config lives under the user's home directory.
    pub fn new() -> Self {
        Self {
            global_dir: dirs::home_dir().map(|home| home.join(CONFIG_DIR)),
        }
    }

    /// Loader with an explicit global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Layer global, local and `overrides` over the defaults, then validate.
    pub fn load(
        &self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<FedConfig, ConfigError> {
        let mut config = FedConfig::default();

        if let Some(path) = self.global_config_path() {
            if let Some(layer) = ConfigLayer::read_optional(&path)? {
                layer.apply_to(&mut config);
            }
        } else {
            debug!("no home directory, skipping global config");
        }

        if let Some(layer) = ConfigLayer::read_optional(&self.local_config_path(root))? {
            layer.apply_to(&mut config);
        }

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a single file over the defaults. Not validated.
    pub fn load_file(&self, path: &Path) -> Result<FedConfig, ConfigError> {
        let mut config = FedConfig::default();
        ConfigLayer::read(path)?.apply_to(&mut config);
        Ok(config)
    }

    /// Write a starter global config unless one exists. Returns its path.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let path = self.global_config_path().ok_or(ConfigError::NoHomeDir)?;
        write_starter(&path)?;
        Ok(path)
    }

    /// Write a starter config under `root` unless one exists. Returns its path.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        let path = self.local_config_path(root);
        write_starter(&path)?;
        Ok(path)
    }
}

fn write_starter(path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::io("create", dir, e))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "config already exists");
            return Ok(());
        }
        Err(e) => return Err(ConfigError::io("create", path, e)),
    };
    file.write_all(STARTER_CONFIG.as_bytes())
        .map_err(|e| ConfigError::io("write", path, e))
}
