//! Wire messages for the `codefed.CodeSearch` gRPC service.
//!
//! ```proto
//! service CodeSearch {
//!   rpc Info(InfoRequest) returns (ServerInfo);
//!   rpc Search(Query) returns (CodeSearchResult);
//! }
//! ```

use prost::Message;

use crate::types;

pub const SEARCH_PATH: &str = "/codefed.CodeSearch/Search";
pub const INFO_PATH: &str = "/codefed.CodeSearch/Info";

#[derive(Clone, PartialEq, Message)]
pub struct Query {
    #[prost(string, tag = "1")]
    pub line: String,
    #[prost(string, tag = "2")]
    pub file: String,
    #[prost(string, tag = "3")]
    pub repo: String,
    #[prost(bool, tag = "5")]
    pub fold_case: bool,
    #[prost(string, tag = "6")]
    pub not_file: String,
    #[prost(string, tag = "7")]
    pub not_repo: String,
    #[prost(int32, tag = "9")]
    pub max_matches: i32,
    #[prost(bool, tag = "10")]
    pub filename_only: bool,
    #[prost(int32, tag = "11")]
    pub context_lines: i32,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct Bounds {
    #[prost(int32, tag = "1")]
    pub left: i32,
    #[prost(int32, tag = "2")]
    pub right: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SearchResult {
    #[prost(string, tag = "1")]
    pub tree: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "3")]
    pub path: String,
    #[prost(int64, tag = "4")]
    pub line_number: i64,
    #[prost(string, repeated, tag = "5")]
    pub context_before: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    pub context_after: Vec<String>,
    #[prost(message, optional, tag = "7")]
    pub bounds: Option<Bounds>,
    #[prost(string, tag = "8")]
    pub line: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct FileResult {
    #[prost(string, tag = "1")]
    pub tree: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "3")]
    pub path: String,
    #[prost(message, optional, tag = "4")]
    pub bounds: Option<Bounds>,
}

/// Defaults to `None`, the first variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ExitReason {
    None = 0,
    Timeout = 1,
    MatchLimit = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct SearchStats {
    #[prost(int64, tag = "1")]
    pub re2_time: i64,
    #[prost(int64, tag = "2")]
    pub git_time: i64,
    #[prost(int64, tag = "3")]
    pub sort_time: i64,
    #[prost(int64, tag = "4")]
    pub index_time: i64,
    #[prost(int64, tag = "5")]
    pub analyze_time: i64,
    #[prost(enumeration = "ExitReason", tag = "6")]
    pub exit_reason: i32,
    #[prost(int64, tag = "7")]
    pub total_time: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct CodeSearchResult {
    #[prost(message, optional, tag = "1")]
    pub stats: Option<SearchStats>,
    #[prost(message, repeated, tag = "2")]
    pub results: Vec<SearchResult>,
    #[prost(message, repeated, tag = "3")]
    pub file_results: Vec<FileResult>,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct InfoRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct Metadata {
    #[prost(string, tag = "1")]
    pub url_pattern: String,
    /// `org/repo` shorthand or a full repository URL
    #[prost(string, tag = "2")]
    pub github: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TreeInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(message, optional, tag = "3")]
    pub metadata: Option<Metadata>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServerInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub trees: Vec<TreeInfo>,
    /// Unix seconds
    #[prost(int64, tag = "4")]
    pub index_time: i64,
}

impl From<&types::Query> for Query {
    fn from(q: &types::Query) -> Self {
        Self {
            line: q.line.clone(),
            file: q.file.clone(),
            repo: q.repo.clone(),
            fold_case: q.fold_case,
            not_file: q.not_file.clone(),
            not_repo: q.not_repo.clone(),
            max_matches: clamp_i32(q.max_matches),
            filename_only: q.filename_only,
            context_lines: clamp_i32(q.context_lines),
        }
    }
}

fn clamp_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

impl From<Option<Bounds>> for types::Bounds {
    fn from(b: Option<Bounds>) -> Self {
        b.map(|b| types::Bounds::new(b.left, b.right))
            .unwrap_or_default()
    }
}

impl From<ExitReason> for types::ExitReason {
    fn from(r: ExitReason) -> Self {
        match r {
            ExitReason::None => Self::None,
            ExitReason::Timeout => Self::Timeout,
            ExitReason::MatchLimit => Self::MatchLimit,
        }
    }
}

impl From<SearchStats> for types::SearchStats {
    fn from(s: SearchStats) -> Self {
        let exit_reason = ExitReason::try_from(s.exit_reason).unwrap_or_default();
        Self {
            re2_time: s.re2_time,
            git_time: s.git_time,
            sort_time: s.sort_time,
            index_time: s.index_time,
            analyze_time: s.analyze_time,
            total_time: s.total_time,
            exit_reason: exit_reason.into(),
        }
    }
}

impl From<CodeSearchResult> for types::CodeSearchResult {
    fn from(r: CodeSearchResult) -> Self {
        Self {
            stats: r.stats.map(Into::into).unwrap_or_default(),
            results: r
                .results
                .into_iter()
                .map(|m| types::SearchResult {
                    tree: m.tree,
                    version: m.version,
                    path: m.path,
                    line_number: m.line_number,
                    context_before: m.context_before,
                    context_after: m.context_after,
                    bounds: m.bounds.into(),
                    line: m.line,
                })
                .collect(),
            file_results: r
                .file_results
                .into_iter()
                .map(|f| types::FileResult {
                    tree: f.tree,
                    version: f.version,
                    path: f.path,
                    bounds: f.bounds.into(),
                })
                .collect(),
        }
    }
}
