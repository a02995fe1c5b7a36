//! Background metadata refresh.
//!
//! Adapters expose a [`MetadataSource`] that fetches an [`IndexUpdate`] from
//! the remote engine. The functions here drive it either once or on a fixed
//! interval. The network round-trip happens outside the store lock; only the
//! resulting update is applied under it. Failures are logged and never leave
//! the task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::store::{IndexInfo, IndexUpdate};

/// Something that can report fresh backend metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync + 'static {
    /// Fetch metadata from the remote engine.
    ///
    /// An empty update means "nothing new"; the store keeps its values.
    async fn fetch(&self) -> Result<IndexUpdate, BackendError>;
}

/// Run one refresh pass. Returns whether the fetch succeeded.
pub async fn refresh_once<S>(backend_id: &str, source: &S, info: &IndexInfo) -> bool
where
    S: MetadataSource + ?Sized,
{
    match source.fetch().await {
        Ok(update) => {
            debug!(
                backend = %backend_id,
                trees = update.trees.as_ref().map(Vec::len),
                "metadata refreshed"
            );
            info.apply(update).await;
            true
        }
        Err(e) => {
            warn!(backend = %backend_id, error = %e, "metadata refresh failed");
            false
        }
    }
}

/// Spawn a task that refreshes once, then exits.
///
/// On failure the store keeps whatever it held before.
pub fn spawn_once<S>(
    backend_id: String,
    source: Arc<S>,
    info: Arc<IndexInfo>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: MetadataSource + ?Sized,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(backend = %backend_id, "refresh cancelled before completion");
            }
            _ = refresh_once(&backend_id, source.as_ref(), &info) => {}
        }
    })
}

/// Spawn a task that refreshes immediately and then every `interval` until
/// `shutdown` is cancelled. A failed pass is retried on the next tick.
pub fn spawn_periodic<S>(
    backend_id: String,
    source: Arc<S>,
    info: Arc<IndexInfo>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: MetadataSource + ?Sized,
{
    tokio::spawn(async move {
        info!(
            backend = %backend_id,
            interval_secs = interval.as_secs(),
            "starting metadata refresh"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = refresh_once(&backend_id, source.as_ref(), &info) => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!(backend = %backend_id, "metadata refresh stopped");
    })
}

/// Owner of a running refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn new(shutdown: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { shutdown, task }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(error = %e, "refresh task panicked");
            }
        }
    }
}
