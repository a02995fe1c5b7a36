//! Adapter for trigram index engines reached over a JSON RPC endpoint.
//!
//! Queries are translated into the engine's boolean query tree, and results
//! are translated back with line-level truncation. Metadata is listed once
//! when the backend starts.

pub mod client;
pub mod native;
pub mod parser;
pub mod results;
pub mod translate;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use client::{TrigramRpcClient, TrigramService};
pub use native::NativeQuery;
pub use translate::query_to_native;

use crate::error::BackendError;
use crate::refresh::{self, MetadataSource};
use crate::store::{IndexInfo, IndexUpdate};
use crate::traits::Searchable;
use crate::types::{CodeSearchResult, Query, Tree};
use native::{ListOptions, RepoList, RepoListEntry};

/// Trigram index search adapter.
pub struct TrigramSearch<S = TrigramRpcClient> {
    id: String,
    service: S,
}

impl TrigramSearch<TrigramRpcClient> {
    /// Create an adapter for the engine at `address`.
    pub fn connect(id: &str, address: &str) -> Result<Self, BackendError> {
        Ok(Self::with_service(id, TrigramRpcClient::new(address)?))
    }
}

impl<S: TrigramService> TrigramSearch<S> {
    pub fn with_service(id: impl Into<String>, service: S) -> Self {
        Self {
            id: id.into(),
            service,
        }
    }
}

#[async_trait]
impl<S: TrigramService> MetadataSource for TrigramSearch<S> {
    async fn fetch(&self) -> Result<IndexUpdate, BackendError> {
        let list = self
            .service
            .list(&NativeQuery::Const(true), &ListOptions { minimal: true })
            .await?;
        Ok(repo_list_to_update(list))
    }
}

#[async_trait]
impl<S: TrigramService> Searchable for TrigramSearch<S> {
    fn start(self: Arc<Self>, info: Arc<IndexInfo>, shutdown: CancellationToken) -> JoinHandle<()> {
        let id = self.id.clone();
        refresh::spawn_once(id, self, info, shutdown)
    }

    async fn search(&self, query: &Query) -> Result<CodeSearchResult, BackendError> {
        let native = query_to_native(query)?;
        let opts = translate::search_options(query);
        debug!(backend = %self.id, query = %native, "trigram search");

        let result = self.service.search(&native, &opts).await?;
        Ok(results::native_to_result(
            result,
            query.effective_max_matches() as usize,
        ))
    }
}

/// Convert a repository listing into a store update.
///
/// An empty listing changes nothing. Otherwise the trees are replaced and
/// the index time comes from the first repository.
fn repo_list_to_update(list: RepoList) -> IndexUpdate {
    let Some(first) = list.repos.first() else {
        return IndexUpdate::default();
    };

    IndexUpdate {
        name: None,
        index_time: first.index_metadata.index_time,
        trees: Some(list.repos.iter().map(tree_from_repo).collect()),
    }
}

fn tree_from_repo(entry: &RepoListEntry) -> Tree {
    let repo = &entry.repository;
    let version = repo
        .branches
        .first()
        .map(|b| b.version.clone())
        .unwrap_or_default();
    Tree::new(&repo.name, version, url_template(repo))
}

/// Join the file and line templates and rewrite their placeholders into the
/// `{version}`, `{path}`, `{lno}` form.
fn url_template(repo: &native::Repository) -> String {
    format!("{}{}", repo.file_url_template, repo.line_fragment_template)
        .replacen("{{.Version}}", "{version}", 1)
        .replacen("{{.Path}}", "{path}", 1)
        .replacen("{{.LineNumber}}", "{lno}", 1)
}
