//! Backend error types.

use thiserror::Error;

/// Errors that can occur during backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Query could not be translated for the backend
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    /// Remote gRPC service returned an error status
    #[error("remote search failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// gRPC transport could not be set up
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Remote server error
    #[error("remote server error: {status} - {message}")]
    RemoteServer { status: u16, message: String },

    /// Connection error
    #[error("connection failed: {0}")]
    Connection(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller cancelled the search
    #[error("search cancelled")]
    Cancelled,

    /// A deadline passed before the backend answered
    #[error("deadline exceeded before the backend answered")]
    DeadlineExceeded,

    /// No backend registered under this id
    #[error("backend '{id}' not found")]
    BackendNotFound { id: String },

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl BackendError {
    /// Create a RemoteServer error.
    pub fn remote_server(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteServer {
            status,
            message: message.into(),
        }
    }

    /// Create a Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a BackendNotFound error.
    pub fn backend_not_found(id: impl Into<String>) -> Self {
        Self::BackendNotFound { id: id.into() }
    }

    /// Add context to any error.
    pub fn with_context(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// A query component that cannot be turned into a native query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Pattern is not a valid regular expression
    #[error("{component}: invalid regular expression '{pattern}': {message}")]
    InvalidRegex {
        component: &'static str,
        pattern: String,
        message: String,
    },

    /// Line expression does not follow the query grammar
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Line expression parsed but holds nothing searchable
    #[error("unable to construct a valid query from '{0}'")]
    Empty(String),
}

impl QueryError {
    /// Create an InvalidRegex error.
    pub fn invalid_regex(
        component: &'static str,
        pattern: impl Into<String>,
        source: &regex::Error,
    ) -> Self {
        Self::InvalidRegex {
            component,
            pattern: pattern.into(),
            message: source.to_string(),
        }
    }

    /// Create a Parse error.
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackendError::backend_not_found("linux");
        assert!(err.to_string().contains("linux"));
        assert!(err.to_string().contains("not found"));

        let err = BackendError::connection("refused");
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_remote_server_error() {
        let err = BackendError::remote_server(500, "Internal server error");
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Internal server error"));
    }

    #[test]
    fn test_with_context() {
        let err = BackendError::with_context("listing repositories", "timed out");
        assert!(err.to_string().contains("listing repositories"));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_query_error_converts() {
        let regex_err = regex::Regex::new("(").unwrap_err();
        let err: BackendError = QueryError::invalid_regex("file", "(", &regex_err).into();
        assert!(matches!(err, BackendError::Query(_)));
        assert!(err.to_string().contains("invalid regular expression '('"));
    }

    #[test]
    fn test_rpc_status_is_forwarded() {
        let err: BackendError = tonic::Status::unavailable("backend down").into();
        match err {
            BackendError::Rpc(status) => {
                assert_eq!(status.code(), tonic::Code::Unavailable);
                assert_eq!(status.message(), "backend down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
