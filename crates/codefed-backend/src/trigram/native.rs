//! Native query and result model of the trigram index engine.
//!
//! These types mirror the engine's JSON RPC payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A text pattern matched against file names, file content, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    pub pattern: String,
    pub case_sensitive: bool,
    pub file_name: bool,
    pub content: bool,
}

impl TextMatch {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    /// Match file names only.
    pub fn file_name_only(mut self) -> Self {
        self.file_name = true;
        self.content = false;
        self
    }

    /// Match file content only.
    pub fn content_only(mut self) -> Self {
        self.file_name = false;
        self.content = true;
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Neither scope chosen yet.
    pub fn is_unscoped(&self) -> bool {
        !self.file_name && !self.content
    }
}

/// Boolean query tree understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NativeQuery {
    Const(bool),
    Substring(TextMatch),
    Regexp(TextMatch),
    RepoRegexp(String),
    Not(Box<NativeQuery>),
    And(Vec<NativeQuery>),
    Or(Vec<NativeQuery>),
}

impl NativeQuery {
    /// Negate `q`.
    pub fn not(q: NativeQuery) -> Self {
        Self::Not(Box::new(q))
    }

    /// Call `f` on every substring and regexp leaf.
    pub fn for_each_text_mut(&mut self, f: &mut impl FnMut(&mut TextMatch)) {
        match self {
            Self::Substring(t) | Self::Regexp(t) => f(t),
            Self::Not(child) => child.for_each_text_mut(f),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.for_each_text_mut(f);
                }
            }
            Self::Const(_) | Self::RepoRegexp(_) => {}
        }
    }
}

fn write_text(f: &mut fmt::Formatter<'_>, kind: &str, t: &TextMatch) -> fmt::Result {
    if t.case_sensitive {
        write!(f, "case_")?;
    }
    match (t.file_name, t.content) {
        (true, false) => write!(f, "file_")?,
        (false, true) => write!(f, "content_")?,
        _ => {}
    }
    write!(f, "{kind}:{:?}", t.pattern)
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, children: &[NativeQuery]) -> fmt::Result {
    write!(f, "({op}")?;
    for child in children {
        write!(f, " {child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(true) => write!(f, "TRUE"),
            Self::Const(false) => write!(f, "FALSE"),
            Self::Substring(t) => write_text(f, "substr", t),
            Self::Regexp(t) => write_text(f, "regex", t),
            Self::RepoRegexp(pattern) => write!(f, "reporegex:{pattern:?}"),
            Self::Not(child) => write!(f, "(not {child})"),
            Self::And(children) => write_list(f, "and", children),
            Self::Or(children) => write_list(f, "or", children),
        }
    }
}

/// Limits sent along with a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Cap on matching files; the engine counts files, not lines
    pub total_max_match_count: u32,
    pub max_doc_display_count: u32,
    pub num_context_lines: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Ask for repository metadata without per-file statistics
    pub minimal: bool,
}

/// Why the engine stopped collecting results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    #[default]
    None,
    TimerExpired,
    FinalFlush,
    MaxSize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub duration_ms: i64,
    pub flush_reason: FlushReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineFragment {
    pub line_offset: i32,
    pub match_length: i32,
}

/// One matching line, or the file name itself when `file_name` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineMatch {
    pub line: String,
    pub line_number: i64,
    pub line_fragments: Vec<LineFragment>,
    pub file_name: bool,

    /// Preceding lines in file order, newline separated
    pub before: String,

    /// Following lines in file order, newline separated
    pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMatch {
    pub file_name: String,
    pub repository: String,
    pub version: String,
    pub line_matches: Vec<LineMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub stats: Stats,
    pub files: Vec<FileMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,

    /// Go-template style, e.g. `https://host/org/repo/blob/{{.Version}}/{{.Path}}`
    pub file_url_template: String,

    /// e.g. `#L{{.LineNumber}}`
    pub line_fragment_template: String,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexMetadata {
    pub index_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoListEntry {
    pub repository: Repository,
    pub index_metadata: IndexMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoList {
    pub repos: Vec<RepoListEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn substr(p: &str) -> NativeQuery {
        NativeQuery::Substring(TextMatch::new(p))
    }

    #[test]
    fn test_display_and() {
        let q = NativeQuery::And(vec![substr("include"), substr("nginx")]);
        assert_eq!(q.to_string(), r#"(and substr:"include" substr:"nginx")"#);
    }

    #[test]
    fn test_display_scopes_and_case() {
        let q = NativeQuery::Or(vec![
            NativeQuery::Regexp(TextMatch::new("a.c").file_name_only()),
            NativeQuery::Substring(TextMatch::new("Foo").content_only().case_sensitive(true)),
            NativeQuery::not(NativeQuery::RepoRegexp("^oss/".into())),
        ]);
        assert_eq!(
            q.to_string(),
            r#"(or file_regex:"a.c" case_content_substr:"Foo" (not reporegex:"^oss/"))"#
        );
    }

    #[test]
    fn test_for_each_text_mut_reaches_nested_leaves() {
        let mut q = NativeQuery::And(vec![
            substr("a"),
            NativeQuery::not(NativeQuery::Or(vec![substr("b"), NativeQuery::Const(true)])),
            NativeQuery::RepoRegexp("r".into()),
        ]);

        let mut seen = Vec::new();
        q.for_each_text_mut(&mut |t| {
            t.case_sensitive = true;
            seen.push(t.pattern.clone());
        });

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(
            q.to_string(),
            r#"(and case_substr:"a" (not (or case_substr:"b" TRUE)) reporegex:"r")"#
        );
    }

    #[test]
    fn test_query_json_shape() {
        let q = NativeQuery::not(NativeQuery::RepoRegexp("linux".into()));
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "not",
                "value": {"type": "repo_regexp", "value": "linux"}
            })
        );
    }

    #[test]
    fn test_search_result_tolerates_missing_fields() {
        let result: SearchResult = serde_json::from_str(
            r#"{"stats": {"flush_reason": "max_size"},
                "files": [{"file_name": "a.c", "line_matches": [{"line": "x"}]}]}"#,
        )
        .unwrap();

        assert_eq!(result.stats.flush_reason, FlushReason::MaxSize);
        assert_eq!(result.stats.duration_ms, 0);
        assert!(result.files[0].line_matches[0].line_fragments.is_empty());
    }

    #[test]
    fn test_repo_list_parses_index_time() {
        let list: RepoList = serde_json::from_str(
            r#"{"repos": [{
                "repository": {"name": "r", "branches": [{"name": "main", "version": "abc"}]},
                "index_metadata": {"index_time": "2024-01-02T03:04:05Z"}
            }]}"#,
        )
        .unwrap();

        let entry = &list.repos[0];
        assert_eq!(entry.repository.branches[0].version, "abc");
        assert_eq!(
            entry.index_metadata.index_time.map(|t| t.timestamp()),
            Some(1_704_164_645)
        );
    }
}
