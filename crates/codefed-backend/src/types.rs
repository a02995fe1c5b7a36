//! Shared types for backend operations.
//!
//! These are the backend-agnostic query and result shapes. Every adapter
//! translates to and from them.

use serde::{Deserialize, Serialize};

/// Context lines used when a query leaves `context_lines` at zero.
pub const DEFAULT_CONTEXT_LINES: u32 = codefed_config::DEFAULT_CONTEXT_LINES;

/// Match limit used when a query leaves `max_matches` at zero.
pub const DEFAULT_MAX_MATCHES: u32 = codefed_config::DEFAULT_MAX_MATCHES;

/// A backend-agnostic search query.
///
/// Empty components are absent. A query with every component empty is valid
/// and matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    /// Pattern matched against line contents
    pub line: String,

    /// Only files whose path matches this pattern
    pub file: String,

    /// Skip files whose path matches this pattern
    pub not_file: String,

    /// Only trees whose name matches this pattern
    pub repo: String,

    /// Skip trees whose name matches this pattern
    pub not_repo: String,

    /// Match case-insensitively
    pub fold_case: bool,

    /// Match the line pattern against file names only
    pub filename_only: bool,

    /// Context lines around each match (0 = default)
    pub context_lines: u32,

    /// Maximum line matches returned (0 = default)
    pub max_matches: u32,
}

impl Query {
    /// Create a query for a line pattern.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            ..Default::default()
        }
    }

    /// Restrict to files matching `pattern`.
    pub fn with_file(mut self, pattern: impl Into<String>) -> Self {
        self.file = pattern.into();
        self
    }

    /// Exclude files matching `pattern`.
    pub fn without_file(mut self, pattern: impl Into<String>) -> Self {
        self.not_file = pattern.into();
        self
    }

    /// Restrict to trees matching `pattern`.
    pub fn with_repo(mut self, pattern: impl Into<String>) -> Self {
        self.repo = pattern.into();
        self
    }

    /// Exclude trees matching `pattern`.
    pub fn without_repo(mut self, pattern: impl Into<String>) -> Self {
        self.not_repo = pattern.into();
        self
    }

    /// Set the match limit.
    pub fn with_max_matches(mut self, max_matches: u32) -> Self {
        self.max_matches = max_matches;
        self
    }

    /// Context line count with the default applied.
    pub fn effective_context_lines(&self) -> u32 {
        if self.context_lines == 0 {
            DEFAULT_CONTEXT_LINES
        } else {
            self.context_lines
        }
    }

    /// Match limit with the default applied.
    pub fn effective_max_matches(&self) -> u32 {
        if self.max_matches == 0 {
            DEFAULT_MAX_MATCHES
        } else {
            self.max_matches
        }
    }
}

/// Character range of a match within a line or path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub right: i32,
}

impl Bounds {
    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }
}

/// A single matching line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Tree (repository) name
    pub tree: String,

    /// Tree version (commit or branch)
    pub version: String,

    /// File path within the tree
    pub path: String,

    /// 1-based line number
    pub line_number: i64,

    /// Lines above the match; index 0 is the line immediately above
    pub context_before: Vec<String>,

    /// Lines below the match, in file order
    pub context_after: Vec<String>,

    /// Match bounds within `line`
    pub bounds: Bounds,

    /// The matching line
    pub line: String,
}

/// A file whose path matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub tree: String,
    pub version: String,
    pub path: String,

    /// Match bounds within `path`
    pub bounds: Bounds,
}

/// Why a search stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Search ran to completion
    #[default]
    None,
    /// Search hit its time budget
    Timeout,
    /// Search hit the match-count limit
    MatchLimit,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::MatchLimit => write!(f, "MATCH_LIMIT"),
        }
    }
}

/// Aggregate search statistics. Times are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub re2_time: i64,
    pub git_time: i64,
    pub sort_time: i64,
    pub index_time: i64,
    pub analyze_time: i64,
    pub total_time: i64,
    pub exit_reason: ExitReason,
}

/// Backend-agnostic search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSearchResult {
    pub stats: SearchStats,

    /// Line matches, in backend order
    pub results: Vec<SearchResult>,

    /// File-name matches, in backend order
    pub file_results: Vec<FileResult>,
}

/// One indexed source tree as reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tree {
    pub name: String,
    pub version: String,

    /// Browse URL template with `{version}`, `{path}` and `{lno}` placeholders
    pub url: String,
}

impl Tree {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url: url.into(),
        }
    }

    /// Render the browse URL for a line in a file of this tree.
    ///
    /// Returns `None` when the tree has no URL template.
    pub fn file_url(&self, path: &str, line_number: i64) -> Option<String> {
        if self.url.is_empty() {
            return None;
        }
        Some(
            self.url
                .replace("{version}", &self.version)
                .replace("{path}", path)
                .replace("{lno}", &line_number.to_string()),
        )
    }
}
