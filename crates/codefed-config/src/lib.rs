//! codefed Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.codefed/config.toml`
//! - Local config: `.codefed/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Default number of context lines around a line match.
pub const DEFAULT_CONTEXT_LINES: u32 = 3;

/// Default maximum number of line matches per search.
pub const DEFAULT_MAX_MATCHES: u32 = 200;

/// Default interval between metadata refreshes for polling backends.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Root configuration for codefed.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FedConfig {
    /// Backend to query when none is named explicitly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,

    /// Search defaults
    pub search: SearchConfig,

    /// Metadata refresh configuration
    pub refresh: RefreshConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Configured search backends, in declaration order
    pub backends: Vec<BackendConfig>,
}

/// Kind of remote search engine behind a backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// gRPC code search service that understands the query model natively
    #[default]
    Grpc,
    /// Trigram index engine reached over its JSON RPC endpoint
    Trigram,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grpc => write!(f, "grpc"),
            Self::Trigram => write!(f, "trigram"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grpc" => Ok(Self::Grpc),
            "trigram" | "zoekt" => Ok(Self::Trigram),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// A single remote search backend.
///
/// # Example TOML
///
/// ```toml
/// [[backends]]
/// id = "linux"
/// address = "http://localhost:9999"
/// kind = "grpc"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Stable backend identifier
    pub id: String,

    /// Network endpoint of the remote engine
    pub address: String,

    /// Engine kind
    #[serde(default)]
    pub kind: BackendKind,

    /// Display name used until the remote engine reports its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BackendConfig {
    /// Create a backend entry.
    pub fn new(id: impl Into<String>, address: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            kind,
            name: None,
        }
    }
}

/// Search defaults applied when a query leaves a limit unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Context lines before and after each match
    pub context_lines: u32,

    /// Maximum number of line matches returned
    pub max_matches: u32,

    /// Per-search deadline in seconds (0 = none)
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            max_matches: DEFAULT_MAX_MATCHES,
            timeout_secs: 30,
        }
    }
}

/// Metadata refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between metadata polls for backends that poll
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,

    /// Log file path (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override default backend id
    pub default_backend: Option<String>,

    /// Extra backend given on the command line (replaces a configured one with the same id)
    pub backend: Option<BackendConfig>,

    /// Override log level
    pub log_level: Option<String>,

    /// Override per-search deadline
    pub timeout_secs: Option<u64>,

    /// Override refresh interval
    pub refresh_interval_secs: Option<u64>,
}

impl FedConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref backend) = overrides.backend {
            self.backends.retain(|b| b.id != backend.id);
            self.backends.push(backend.clone());
        }

        if let Some(ref id) = overrides.default_backend {
            self.default_backend = Some(id.clone());
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }

        if let Some(timeout) = overrides.timeout_secs {
            self.search.timeout_secs = timeout;
        }

        if let Some(interval) = overrides.refresh_interval_secs {
            self.refresh.interval_secs = interval;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                return Err(ConfigError::invalid("backends.id", "must not be empty"));
            }
            if backend.address.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("backends.{}.address", backend.id),
                    "must not be empty",
                ));
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::DuplicateBackend {
                    id: backend.id.clone(),
                });
            }
        }

        if let Some(ref id) = self.default_backend {
            if !seen.contains(id.as_str()) {
                return Err(ConfigError::invalid(
                    "default_backend",
                    format!("backend '{}' is not configured", id),
                ));
            }
        }

        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "refresh.interval_secs",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Look up a backend by id.
    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// The backend to use when none is named: the configured default, else the first one.
    pub fn default_backend_id(&self) -> Option<&str> {
        self.default_backend
            .as_deref()
            .or_else(|| self.backends.first().map(|b| b.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_backends() -> FedConfig {
        FedConfig {
            backends: vec![
                BackendConfig::new("linux", "http://localhost:9999", BackendKind::Grpc),
                BackendConfig::new("oss", "http://localhost:6070", BackendKind::Trigram),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = FedConfig::default();
        assert_eq!(config.search.context_lines, 3);
        assert_eq!(config.search.max_matches, 200);
        assert_eq!(config.refresh.interval_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.backends.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = two_backends();
        let overrides = ConfigOverrides {
            default_backend: Some("oss".to_string()),
            log_level: Some("debug".to_string()),
            timeout_secs: Some(5),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.default_backend.as_deref(), Some("oss"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.search.timeout_secs, 5);
    }

    #[test]
    fn test_override_backend_replaces_same_id() {
        let mut config = two_backends();
        let overrides = ConfigOverrides {
            backend: Some(BackendConfig::new(
                "linux",
                "http://other:9999",
                BackendKind::Grpc,
            )),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.backends.len(), 2);
        assert_eq!(
            config.backend("linux").map(|b| b.address.as_str()),
            Some("http://other:9999")
        );
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut config = two_backends();
        config.backends.push(BackendConfig::new(
            "linux",
            "http://dup:1",
            BackendKind::Trigram,
        ));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBackend { .. }));
    }

    #[test]
    fn test_validate_empty_address() {
        let mut config = two_backends();
        config.backends[1].address = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backends.oss.address"));
    }

    #[test]
    fn test_validate_unknown_default_backend() {
        let mut config = two_backends();
        config.default_backend = Some("missing".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_backend_id_falls_back_to_first() {
        let mut config = two_backends();
        assert_eq!(config.default_backend_id(), Some("linux"));

        config.default_backend = Some("oss".to_string());
        assert_eq!(config.default_backend_id(), Some("oss"));

        assert_eq!(FedConfig::default().default_backend_id(), None);
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Grpc.to_string(), "grpc");
        assert_eq!(BackendKind::Trigram.to_string(), "trigram");
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("grpc".parse::<BackendKind>().unwrap(), BackendKind::Grpc);
        assert_eq!(
            "Trigram".parse::<BackendKind>().unwrap(),
            BackendKind::Trigram
        );
        assert_eq!("zoekt".parse::<BackendKind>().unwrap(), BackendKind::Trigram);
        assert!("elastic".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backends_toml_roundtrip() {
        let mut config = two_backends();
        config.backends[0].name = Some("Linux kernel".to_string());

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: FedConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_backend_kind_defaults_to_grpc() {
        let parsed: FedConfig = toml::from_str(
            r#"
            [[backends]]
            id = "linux"
            address = "http://localhost:9999"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.backends[0].kind, BackendKind::Grpc);
        assert_eq!(parsed.backends[0].name, None);
    }
}
