//! Search capability trait.
//!
//! Defines the async interface every backend adapter implements.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::store::IndexInfo;
use crate::types::{CodeSearchResult, Query};

/// A remote search engine adapter.
///
/// Implementations translate [`Query`] into the engine's native form, run it,
/// and translate the answer back. They also know how to keep an [`IndexInfo`]
/// current. New engine kinds are added by implementing this trait.
#[async_trait]
pub trait Searchable: Send + Sync + 'static {
    /// Spawn the metadata refresh task for this adapter.
    ///
    /// The task writes only to `info` and exits once `shutdown` is cancelled.
    fn start(self: Arc<Self>, info: Arc<IndexInfo>, shutdown: CancellationToken)
        -> JoinHandle<()>;

    /// Run a query against the remote engine.
    ///
    /// Errors from the engine are returned unchanged. The call holds no shared
    /// state, so any number of searches may run concurrently.
    async fn search(&self, query: &Query) -> Result<CodeSearchResult, BackendError>;
}
