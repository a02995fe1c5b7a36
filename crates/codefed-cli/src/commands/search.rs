//! Search command - Run one query against a backend

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use codefed_backend::{CodeSearchResult, Query, SearchContext, Tree};
use codefed_config::FedConfig;
use serde::Serialize;

use super::{create_registry, print_info, print_warning, resolve_backend, wait_for_metadata};
use crate::progress;
use crate::GlobalOptions;

/// How long `--links` waits for a backend to report its trees.
const METADATA_WAIT: Duration = Duration::from_secs(10);

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Pattern matched against line contents
    pattern: String,

    /// Only files whose path matches this regex
    #[arg(long, short = 'f')]
    file: Option<String>,

    /// Skip files whose path matches this regex
    #[arg(long)]
    not_file: Option<String>,

    /// Only trees whose name matches this regex
    #[arg(long, short = 'r')]
    repo: Option<String>,

    /// Skip trees whose name matches this regex
    #[arg(long)]
    not_repo: Option<String>,

    /// Match case-insensitively
    #[arg(long, short = 'i')]
    ignore_case: bool,

    /// Match the pattern against file names only
    #[arg(long)]
    filename_only: bool,

    /// Context lines around each match
    #[arg(long, short = 'C')]
    context: Option<u32>,

    /// Maximum number of line matches
    #[arg(long, short = 'n')]
    max_matches: Option<u32>,

    /// Deadline in seconds (0 = none)
    #[arg(long)]
    timeout: Option<u64>,

    /// Print a browse URL for each match
    #[arg(long)]
    links: bool,

    /// Output format: text (default), json
    #[arg(long, short = 'o', default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// JSON output: the backend result plus where it came from.
#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    backend: &'a str,
    query: &'a Query,
    #[serde(flatten)]
    result: &'a CodeSearchResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    links: Vec<Option<String>>,
}

impl SearchArgs {
    /// Build the query, taking unset limits from the configuration.
    fn to_query(&self, config: &FedConfig) -> Query {
        Query {
            line: self.pattern.clone(),
            file: self.file.clone().unwrap_or_default(),
            not_file: self.not_file.clone().unwrap_or_default(),
            repo: self.repo.clone().unwrap_or_default(),
            not_repo: self.not_repo.clone().unwrap_or_default(),
            fold_case: self.ignore_case,
            filename_only: self.filename_only,
            context_lines: self.context.unwrap_or(config.search.context_lines),
            max_matches: self.max_matches.unwrap_or(config.search.max_matches),
        }
    }

    fn search_context(&self, config: &FedConfig) -> SearchContext {
        match self.timeout.unwrap_or(config.search.timeout_secs) {
            0 => SearchContext::new(),
            secs => SearchContext::with_timeout(Duration::from_secs(secs)),
        }
    }
}

/// Execute the search command
pub async fn execute(args: SearchArgs, config: FedConfig, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&config)?;
    let backend = resolve_backend(&registry, &global).await?;

    let trees = if args.links {
        backend.start().await;
        let pb = progress::spinner(
            &format!("Fetching metadata from '{}'...", backend.id()),
            global.quiet,
        );
        let ready = wait_for_metadata(&backend, METADATA_WAIT).await;
        progress::clear_spinner(pb);
        if !ready {
            print_warning(&format!("backend '{}' reported no trees", backend.id()));
        }
        backend.info().trees().await.to_vec()
    } else {
        Vec::new()
    };

    let query = args.to_query(&config);
    let ctx = args.search_context(&config);

    let cancel = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = backend.search_with(&ctx, &query).await;
    backend.shutdown().await;
    let result = result.with_context(|| format!("Search on '{}' failed", backend.id()))?;

    let links = if args.links {
        result
            .results
            .iter()
            .map(|m| browse_url(&trees, &m.tree, &m.path, m.line_number))
            .collect()
    } else {
        Vec::new()
    };

    match args.output {
        OutputFormat::Json => {
            let output = SearchOutput {
                backend: backend.id(),
                query: &query,
                result: &result,
                links,
            };
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialize results")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if result.results.is_empty() && result.file_results.is_empty() {
                print_info(&format!("No results found for: {}", args.pattern), global.quiet);
                return Ok(());
            }

            for line in render_text(&result, &links) {
                println!("{}", line);
            }
            print_info(&summary(&result), global.quiet);
        }
    }

    Ok(())
}

/// Browse URL of a match, when its tree is known and has a template.
fn browse_url(trees: &[Tree], tree: &str, path: &str, line_number: i64) -> Option<String> {
    trees
        .iter()
        .find(|t| t.name == tree)
        .and_then(|t| t.file_url(path, line_number))
}

/// Grep-style lines: `tree:path:line:text` for matches, `-` separators for context.
fn render_text(result: &CodeSearchResult, links: &[Option<String>]) -> Vec<String> {
    let mut out = Vec::new();

    for file in &result.file_results {
        out.push(format!("{}:{}", file.tree, file.path));
    }

    for (i, m) in result.results.iter().enumerate() {
        let has_context = !m.context_before.is_empty() || !m.context_after.is_empty();
        if has_context && !out.is_empty() {
            out.push("--".to_string());
        }

        let first = m.line_number - m.context_before.len() as i64;
        for (offset, text) in m.context_before.iter().rev().enumerate() {
            out.push(format!(
                "{}:{}-{}-{}",
                m.tree,
                m.path,
                first + offset as i64,
                text
            ));
        }

        out.push(format!("{}:{}:{}:{}", m.tree, m.path, m.line_number, m.line));

        for (offset, text) in m.context_after.iter().enumerate() {
            out.push(format!(
                "{}:{}-{}-{}",
                m.tree,
                m.path,
                m.line_number + 1 + offset as i64,
                text
            ));
        }

        if let Some(Some(url)) = links.get(i) {
            out.push(format!("  {}", url));
        }
    }

    out
}

fn summary(result: &CodeSearchResult) -> String {
    format!(
        "\n{} line matches, {} file matches in {}ms (exit: {})",
        result.results.len(),
        result.file_results.len(),
        result.stats.total_time,
        result.stats.exit_reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use codefed_backend::{ExitReason, FileResult, SearchResult, SearchStats};

    fn args(argv: &[&str]) -> SearchArgs {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: SearchArgs,
        }

        let mut full = vec!["search"];
        full.extend_from_slice(argv);
        Wrapper::try_parse_from(full).unwrap().args
    }

    fn result() -> CodeSearchResult {
        CodeSearchResult {
            stats: SearchStats {
                total_time: 12,
                exit_reason: ExitReason::MatchLimit,
                ..Default::default()
            },
            results: vec![SearchResult {
                tree: "linux".into(),
                version: "v6.1".into(),
                path: "kernel/fork.c".into(),
                line_number: 10,
                context_before: vec!["nine".into(), "eight".into()],
                context_after: vec!["eleven".into()],
                line: "ten".into(),
                ..Default::default()
            }],
            file_results: vec![FileResult {
                tree: "linux".into(),
                path: "kernel/fork.h".into(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_query_from_flags() {
        let config = FedConfig::default();
        let query = args(&[
            "spin_lock",
            "-f",
            r"\.c$",
            "--not-file",
            "test",
            "-r",
            "linux",
            "--not-repo",
            "staging",
            "-i",
            "-C",
            "1",
            "-n",
            "50",
        ])
        .to_query(&config);

        assert_eq!(query.line, "spin_lock");
        assert_eq!(query.file, r"\.c$");
        assert_eq!(query.not_file, "test");
        assert_eq!(query.repo, "linux");
        assert_eq!(query.not_repo, "staging");
        assert!(query.fold_case);
        assert!(!query.filename_only);
        assert_eq!(query.context_lines, 1);
        assert_eq!(query.max_matches, 50);
    }

    #[test]
    fn test_query_limits_default_to_config() {
        let mut config = FedConfig::default();
        config.search.context_lines = 0;
        config.search.max_matches = 7;

        let query = args(&["x"]).to_query(&config);
        assert_eq!(query.context_lines, 0);
        assert_eq!(query.max_matches, 7);
        assert!(query.file.is_empty());
    }

    #[test]
    fn test_timeout_zero_means_no_deadline() {
        let config = FedConfig::default();
        assert!(args(&["x", "--timeout", "0"]).search_context(&config).deadline().is_none());
        assert!(args(&["x"]).search_context(&config).deadline().is_some());
    }

    #[test]
    fn test_render_text_orders_context() {
        let links = vec![Some("https://example.com/fork.c#L10".to_string())];
        let lines = render_text(&result(), &links);

        assert_eq!(
            lines,
            vec![
                "linux:kernel/fork.h",
                "--",
                "linux:kernel/fork.c-8-eight",
                "linux:kernel/fork.c-9-nine",
                "linux:kernel/fork.c:10:ten",
                "linux:kernel/fork.c-11-eleven",
                "  https://example.com/fork.c#L10",
            ]
        );
    }

    #[test]
    fn test_browse_url_needs_known_tree() {
        let trees = vec![Tree::new(
            "linux",
            "v6.1",
            "https://example.com/{version}/{path}#L{lno}",
        )];

        assert_eq!(
            browse_url(&trees, "linux", "mm/slab.c", 3).as_deref(),
            Some("https://example.com/v6.1/mm/slab.c#L3")
        );
        assert_eq!(browse_url(&trees, "bsd", "mm/slab.c", 3), None);
    }

    #[test]
    fn test_summary_mentions_exit_reason() {
        let text = summary(&result());
        assert!(text.contains("1 line matches"));
        assert!(text.contains("MATCH_LIMIT"));
    }
}
