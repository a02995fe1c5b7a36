//! Adapter for code search engines that speak the `codefed.CodeSearch` gRPC
//! protocol.
//!
//! Queries pass through unchanged. Metadata is polled from the `Info` RPC
//! immediately on start and then on a fixed interval. A poll that is still
//! waiting for the service when the next one is due gives up.

pub mod client;
pub mod proto;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use client::{CodeSearchService, GrpcClient};

use crate::error::BackendError;
use crate::refresh::{self, MetadataSource};
use crate::store::{IndexInfo, IndexUpdate};
use crate::traits::Searchable;
use crate::types::{CodeSearchResult, Query, Tree};

const GITHUB_BASE: &str = "https://github.com/";

/// gRPC search adapter.
pub struct GrpcSearch<C = GrpcClient> {
    id: String,
    client: C,
    refresh_interval: Duration,
}

impl GrpcSearch<GrpcClient> {
    /// Create an adapter for `address`. The channel connects on first use.
    pub fn connect(
        id: &str,
        address: &str,
        refresh_interval: Duration,
    ) -> Result<Self, BackendError> {
        let client = GrpcClient::connect_lazy(address)?;
        Ok(Self::with_client(id, client, refresh_interval))
    }
}

impl<C: CodeSearchService> GrpcSearch<C> {
    pub fn with_client(id: impl Into<String>, client: C, refresh_interval: Duration) -> Self {
        Self {
            id: id.into(),
            client,
            refresh_interval,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

#[async_trait]
impl<C: CodeSearchService> MetadataSource for GrpcSearch<C> {
    async fn fetch(&self) -> Result<IndexUpdate, BackendError> {
        let call = self.client.info();
        let info = if self.refresh_interval.is_zero() {
            call.await?
        } else {
            tokio::time::timeout(self.refresh_interval, call)
                .await
                .map_err(|_| BackendError::DeadlineExceeded)??
        };
        Ok(server_info_to_update(info))
    }
}

#[async_trait]
impl<C: CodeSearchService> Searchable for GrpcSearch<C> {
    fn start(self: Arc<Self>, info: Arc<IndexInfo>, shutdown: CancellationToken) -> JoinHandle<()> {
        let id = self.id.clone();
        let interval = self.refresh_interval;
        refresh::spawn_periodic(id, self, info, interval, shutdown)
    }

    async fn search(&self, query: &Query) -> Result<CodeSearchResult, BackendError> {
        debug!(backend = %self.id, line = %query.line, "grpc search");
        let result = self.client.search(proto::Query::from(query)).await?;
        Ok(result.into())
    }
}

/// Convert an `Info` reply into a store update.
///
/// An empty name or tree list leaves the stored value alone. The index time
/// is always taken.
fn server_info_to_update(info: proto::ServerInfo) -> IndexUpdate {
    let name = (!info.name.is_empty()).then_some(info.name);
    let trees = (!info.trees.is_empty())
        .then(|| info.trees.into_iter().map(tree_from_info).collect());

    IndexUpdate {
        name,
        trees,
        index_time: DateTime::from_timestamp(info.index_time, 0),
    }
}

fn tree_from_info(tree: proto::TreeInfo) -> Tree {
    let url = tree
        .metadata
        .as_ref()
        .map(tree_url_template)
        .unwrap_or_default();
    Tree::new(tree.name, tree.version, url)
}

/// Browse URL template for a tree.
///
/// A `github` value wins over `url_pattern`. It may be an absolute URL, an
/// absolute path used as-is, or an `org/repo` shorthand.
fn tree_url_template(metadata: &proto::Metadata) -> String {
    if metadata.github.is_empty() {
        return metadata.url_pattern.clone();
    }

    let github = &metadata.github;
    let base = if github.starts_with('/') || url::Url::parse(github).is_ok() {
        github.clone()
    } else {
        format!("{GITHUB_BASE}{github}")
    };
    format!("{base}/blob/{{version}}/{{path}}#L{{lno}}")
}
