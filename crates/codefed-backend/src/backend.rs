//! Backend handle.
//!
//! A [`Backend`] pairs a stable id and address with its metadata store and a
//! search capability. The id, address and capability never change after
//! construction; only the store does, and only through the refresh task.

use std::sync::Arc;
use std::time::Duration;

use codefed_config::BackendKind;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::BackendError;
use crate::grpc::GrpcSearch;
use crate::refresh::RefreshHandle;
use crate::store::{IndexInfo, IndexSnapshot};
use crate::traits::Searchable;
use crate::trigram::TrigramSearch;
use crate::types::{CodeSearchResult, Query};

/// Per-call search context: cancellation plus an optional deadline.
///
/// When either fires, the in-flight request future is dropped, which aborts
/// the network call.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl SearchContext {
    /// A context that never expires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now. A timeout too large to
    /// represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Use an existing token for cancellation.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels searches run under this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel searches run under this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// One remote search engine with its cached metadata.
pub struct Backend {
    id: String,
    address: String,
    kind: BackendKind,
    info: Arc<IndexInfo>,
    searchable: Arc<dyn Searchable>,
    refresh: Mutex<Option<RefreshHandle>>,
}

impl Backend {
    /// Wrap an adapter. The store starts empty with the id as display name.
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        kind: BackendKind,
        searchable: Arc<dyn Searchable>,
    ) -> Self {
        let id = id.into();
        Self {
            info: Arc::new(IndexInfo::new(id.clone())),
            id,
            address: address.into(),
            kind,
            searchable,
            refresh: Mutex::new(None),
        }
    }

    /// Seed the display name shown until the engine reports its own.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info = Arc::new(IndexInfo::new(name));
        self
    }

    /// Connect to a gRPC code search service.
    ///
    /// The channel connects lazily, so this only fails for a malformed address.
    pub fn grpc(
        id: impl Into<String>,
        address: impl Into<String>,
        refresh_interval: Duration,
    ) -> Result<Self, BackendError> {
        let id = id.into();
        let address = address.into();
        let adapter = GrpcSearch::connect(&id, &address, refresh_interval)?;
        Ok(Self::new(id, address, BackendKind::Grpc, Arc::new(adapter)))
    }

    /// Connect to a trigram index engine over its JSON RPC endpoint.
    pub fn trigram(
        id: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let id = id.into();
        let address = address.into();
        let adapter = TrigramSearch::connect(&id, &address)?;
        Ok(Self::new(id, address, BackendKind::Trigram, Arc::new(adapter)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The backend's metadata store.
    pub fn info(&self) -> &Arc<IndexInfo> {
        &self.info
    }

    /// A consistent copy of the backend's metadata.
    pub async fn snapshot(&self) -> IndexSnapshot {
        self.info.snapshot().await
    }

    /// Start the metadata refresh task.
    ///
    /// Only the first call spawns a task; later calls do nothing.
    pub async fn start(&self) {
        let mut refresh = self.refresh.lock().await;
        if refresh.is_some() {
            debug!(backend = %self.id, "refresh already started");
            return;
        }

        info!(backend = %self.id, address = %self.address, kind = %self.kind, "starting backend");
        let shutdown = CancellationToken::new();
        let task = Arc::clone(&self.searchable).start(Arc::clone(&self.info), shutdown.clone());
        *refresh = Some(RefreshHandle::new(shutdown, task));
    }

    /// Whether `start` has been called and the refresh task not shut down.
    pub async fn is_started(&self) -> bool {
        self.refresh.lock().await.is_some()
    }

    /// Stop the refresh task, if running, and wait for it.
    pub async fn shutdown(&self) {
        let handle = self.refresh.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            debug!(backend = %self.id, "backend refresh stopped");
        }
    }

    /// Run a query. Errors from the adapter are returned as-is.
    pub async fn search(&self, query: &Query) -> Result<CodeSearchResult, BackendError> {
        self.searchable.search(query).await
    }

    /// Run a query bounded by `ctx`.
    pub async fn search_with(
        &self,
        ctx: &SearchContext,
        query: &Query,
    ) -> Result<CodeSearchResult, BackendError> {
        let search = self.searchable.search(query);

        match ctx.deadline {
            Some(deadline) => tokio::select! {
                _ = ctx.cancel.cancelled() => Err(BackendError::Cancelled),
                result = tokio::time::timeout_at(deadline, search) => {
                    result.unwrap_or(Err(BackendError::DeadlineExceeded))
                }
            },
            None => tokio::select! {
                _ = ctx.cancel.cancelled() => Err(BackendError::Cancelled),
                result = search => result,
            },
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("kind", &self.kind)
            .finish()
    }
}
