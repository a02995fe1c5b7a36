//! Query translation into the trigram engine's native query tree.

use super::native::{NativeQuery, SearchOptions};
use super::parser;
use crate::error::QueryError;
use crate::types::Query;

/// Translate `query` into a native query.
///
/// Every non-empty component becomes one term. A single term is returned
/// as-is; several are joined by `And`; none at all matches everything.
pub fn query_to_native(query: &Query) -> Result<NativeQuery, QueryError> {
    let case_sensitive = !query.fold_case;
    let mut terms = Vec::new();

    if !query.line.is_empty() {
        terms.push(line_to_native(&query.line, case_sensitive, query.filename_only)?);
    }
    if !query.file.is_empty() {
        terms.push(file_term("file", &query.file, case_sensitive)?);
    }
    if !query.not_file.is_empty() {
        terms.push(NativeQuery::not(file_term(
            "not_file",
            &query.not_file,
            case_sensitive,
        )?));
    }
    if !query.repo.is_empty() {
        terms.push(parser::repo_leaf("repo", &query.repo)?);
    }
    if !query.not_repo.is_empty() {
        terms.push(NativeQuery::not(parser::repo_leaf(
            "not_repo",
            &query.not_repo,
        )?));
    }

    Ok(match terms.len() {
        0 => NativeQuery::Const(true),
        1 => terms.remove(0),
        _ => NativeQuery::And(terms),
    })
}

/// Search limits for `query`, defaults filled in.
pub fn search_options(query: &Query) -> SearchOptions {
    let max_matches = query.effective_max_matches();
    SearchOptions {
        total_max_match_count: max_matches,
        max_doc_display_count: max_matches,
        num_context_lines: query.effective_context_lines(),
    }
}

/// Parse the line expression and fix scope and case on its text leaves.
///
/// Leaves without an explicit field search file names and content, or only
/// file names when `filename_only` is set. A `case:` field in the expression
/// takes precedence over `case_sensitive`.
fn line_to_native(
    line: &str,
    case_sensitive: bool,
    filename_only: bool,
) -> Result<NativeQuery, QueryError> {
    let parsed = parser::parse_line(line)?;
    let mut query = parsed.query;

    query.for_each_text_mut(&mut |text| {
        if text.is_unscoped() {
            text.file_name = true;
            text.content = !filename_only;
        }
        text.case_sensitive = match parsed.case {
            Some(mode) => mode.is_sensitive(&text.pattern),
            None => case_sensitive,
        };
    });

    Ok(query)
}

fn file_term(
    component: &'static str,
    pattern: &str,
    case_sensitive: bool,
) -> Result<NativeQuery, QueryError> {
    let mut term = parser::text_leaf(component, pattern)?;
    term.for_each_text_mut(&mut |text| {
        text.file_name = true;
        text.content = false;
        text.case_sensitive = case_sensitive;
    });
    Ok(term)
}
