//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded or written.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file or directory could not be accessed
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML for the config schema
    #[error("syntax error in '{}': {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No home directory to place the global config under
    #[error("could not determine home directory")]
    NoHomeDir,

    /// A key holds a value the federation cannot use
    #[error("invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    /// Two backends share an id
    #[error("backend '{id}' is configured more than once")]
    DuplicateBackend { id: String },

    /// A backend kind name that no adapter handles
    #[error("unknown backend kind '{0}', expected grpc or trigram")]
    UnknownKind(String),
}

impl ConfigError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_action_and_path() {
        let err = ConfigError::io(
            "read",
            "/etc/codefed.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "failed to read '/etc/codefed.toml': gone");
    }

    #[test]
    fn test_invalid_names_key() {
        let err = ConfigError::invalid("refresh.interval_secs", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "invalid value for 'refresh.interval_secs': must be greater than zero"
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = ConfigError::UnknownKind("lucene".into());
        assert!(err.to_string().contains("'lucene'"));
    }
}
