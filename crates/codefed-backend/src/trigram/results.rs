//! Translation of native search results.

use super::native::{self, FlushReason, LineMatch};
use crate::types::{Bounds, CodeSearchResult, ExitReason, FileResult, SearchResult, SearchStats};

/// Convert a native result, keeping at most `max_matches` line results.
///
/// The engine limits matching files, not lines, so the line limit is applied
/// here. Reaching it stops translation and reports `MatchLimit`.
pub fn native_to_result(native: native::SearchResult, max_matches: usize) -> CodeSearchResult {
    let mut exit_reason = match native.stats.flush_reason {
        FlushReason::MaxSize => ExitReason::MatchLimit,
        FlushReason::TimerExpired => ExitReason::Timeout,
        FlushReason::None | FlushReason::FinalFlush => ExitReason::None,
    };

    let mut results = Vec::new();
    let mut file_results = Vec::new();

    'files: for file in native.files {
        for line_match in file.line_matches {
            let bounds = first_fragment_bounds(&line_match);

            if line_match.file_name {
                file_results.push(FileResult {
                    tree: file.repository.clone(),
                    version: file.version.clone(),
                    path: file.file_name.clone(),
                    bounds,
                });
            } else {
                results.push(SearchResult {
                    tree: file.repository.clone(),
                    version: file.version.clone(),
                    path: file.file_name.clone(),
                    line_number: line_match.line_number,
                    context_before: context_before(&line_match.before),
                    context_after: context_after(&line_match.after),
                    bounds,
                    line: line_match.line,
                });
            }

            if results.len() == max_matches {
                exit_reason = ExitReason::MatchLimit;
                break 'files;
            }
        }
    }

    CodeSearchResult {
        stats: SearchStats {
            total_time: native.stats.duration_ms,
            exit_reason,
            ..Default::default()
        },
        results,
        file_results,
    }
}

fn first_fragment_bounds(line_match: &LineMatch) -> Bounds {
    line_match
        .line_fragments
        .first()
        .map(|f| Bounds::new(f.line_offset, f.line_offset.saturating_add(f.match_length)))
        .unwrap_or_default()
}

/// Nearest line first.
fn context_before(before: &str) -> Vec<String> {
    if before.is_empty() {
        return Vec::new();
    }
    before.split('\n').rev().map(str::to_string).collect()
}

fn context_after(after: &str) -> Vec<String> {
    if after.is_empty() {
        return Vec::new();
    }
    after.split('\n').map(str::to_string).collect()
}
