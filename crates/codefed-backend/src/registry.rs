//! Backend registry.
//!
//! Holds every configured backend by id, builds them from configuration,
//! and starts or stops their refresh tasks together.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use codefed_config::{BackendConfig, BackendKind, FedConfig};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::BackendError;

/// Summary of one registered backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub id: String,
    pub address: String,
    pub kind: BackendKind,

    /// Current display name
    pub name: String,

    /// Number of trees the engine last reported
    pub tree_count: usize,

    /// When the engine last rebuilt its index
    pub index_time: Option<DateTime<Utc>>,

    /// Whether the refresh task has been started
    pub started: bool,
}

/// Registry of backends, in registration order.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: RwLock<Vec<Arc<Backend>>>,
    default_id: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend for every configured entry.
    ///
    /// Fails on the first entry that cannot be constructed or on a duplicate id.
    pub fn from_config(config: &FedConfig) -> Result<Self, BackendError> {
        let interval = Duration::from_secs(config.refresh.interval_secs);
        let mut backends: Vec<Arc<Backend>> = Vec::with_capacity(config.backends.len());

        for entry in &config.backends {
            if backends.iter().any(|b| b.id() == entry.id) {
                return Err(duplicate(&entry.id));
            }
            backends.push(Arc::new(create_backend(entry, interval)?));
        }

        info!(count = backends.len(), "backends configured");
        Ok(Self {
            backends: RwLock::new(backends),
            default_id: config.default_backend.clone(),
        })
    }

    /// Set the backend returned by [`default_backend`](Self::default_backend).
    pub fn with_default(mut self, id: impl Into<String>) -> Self {
        self.default_id = Some(id.into());
        self
    }

    /// Add a backend. Ids must be unique.
    pub async fn register(&self, backend: Backend) -> Result<Arc<Backend>, BackendError> {
        let mut backends = self.backends.write().await;
        if backends.iter().any(|b| b.id() == backend.id()) {
            return Err(duplicate(backend.id()));
        }

        debug!(backend = %backend.id(), "registering backend");
        let backend = Arc::new(backend);
        backends.push(Arc::clone(&backend));
        Ok(backend)
    }

    /// Remove a backend and stop its refresh task.
    ///
    /// Returns whether a backend with this id existed.
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut backends = self.backends.write().await;
            backends
                .iter()
                .position(|b| b.id() == id)
                .map(|i| backends.remove(i))
        };

        match removed {
            Some(backend) => {
                backend.shutdown().await;
                info!(backend = %id, "unregistered backend");
                true
            }
            None => {
                warn!(backend = %id, "backend not found in registry");
                false
            }
        }
    }

    /// Look up a backend by id.
    pub async fn get(&self, id: &str) -> Result<Arc<Backend>, BackendError> {
        self.backends
            .read()
            .await
            .iter()
            .find(|b| b.id() == id)
            .cloned()
            .ok_or_else(|| BackendError::backend_not_found(id))
    }

    /// The configured default backend, else the first registered one.
    pub async fn default_backend(&self) -> Result<Arc<Backend>, BackendError> {
        if let Some(id) = &self.default_id {
            return self.get(id).await;
        }
        self.backends.read().await.first().cloned().ok_or_else(|| {
            BackendError::with_context("selecting default backend", "no backends configured")
        })
    }

    /// Resolve `id`, or the default backend when `None`.
    pub async fn resolve(&self, id: Option<&str>) -> Result<Arc<Backend>, BackendError> {
        match id {
            Some(id) => self.get(id).await,
            None => self.default_backend().await,
        }
    }

    /// All backends in registration order.
    pub async fn backends(&self) -> Vec<Arc<Backend>> {
        self.backends.read().await.clone()
    }

    /// Summaries of all backends in registration order.
    pub async fn list(&self) -> Vec<BackendInfo> {
        let backends = self.backends().await;
        let mut infos = Vec::with_capacity(backends.len());
        for backend in backends {
            let snapshot = backend.snapshot().await;
            infos.push(BackendInfo {
                id: backend.id().to_string(),
                address: backend.address().to_string(),
                kind: backend.kind(),
                name: snapshot.name,
                tree_count: snapshot.trees.len(),
                index_time: snapshot.index_time,
                started: backend.is_started().await,
            });
        }
        infos
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.read().await.is_empty()
    }

    /// Start every backend's refresh task.
    pub async fn start_all(&self) {
        for backend in self.backends().await {
            backend.start().await;
        }
    }

    /// Stop every backend's refresh task and wait for them.
    pub async fn shutdown_all(&self) {
        let backends = self.backends().await;
        join_all(backends.iter().map(|b| b.shutdown())).await;
        debug!(count = backends.len(), "all backends stopped");
    }
}

/// Construct a backend from its configuration entry.
pub fn create_backend(
    entry: &BackendConfig,
    refresh_interval: Duration,
) -> Result<Backend, BackendError> {
    let backend = match entry.kind {
        BackendKind::Grpc => Backend::grpc(&entry.id, &entry.address, refresh_interval),
        BackendKind::Trigram => Backend::trigram(&entry.id, &entry.address),
    }
    .map_err(|e| {
        BackendError::with_context(format!("creating backend '{}'", entry.id), e.to_string())
    })?;

    Ok(match &entry.name {
        Some(name) => backend.with_name(name),
        None => backend,
    })
}

fn duplicate(id: &str) -> BackendError {
    BackendError::with_context("registering backend", format!("duplicate backend id '{id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IndexInfo, IndexUpdate};
    use crate::traits::Searchable;
    use crate::types::{CodeSearchResult, Query, Tree};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    /// Adapter whose refresh reports a fixed tree and waits for shutdown.
    struct StaticAdapter;

    #[async_trait]
    impl Searchable for StaticAdapter {
        fn start(
            self: Arc<Self>,
            info: Arc<IndexInfo>,
            shutdown: CancellationToken,
        ) -> JoinHandle<()> {
            tokio::spawn(async move {
                info.apply(IndexUpdate {
                    trees: Some(vec![Tree::new("t", "v", "")]),
                    ..Default::default()
                })
                .await;
                shutdown.cancelled().await;
            })
        }

        async fn search(&self, _query: &Query) -> Result<CodeSearchResult, BackendError> {
            Ok(CodeSearchResult::default())
        }
    }

    fn static_backend(id: &str) -> Backend {
        Backend::new(id, "mem://", BackendKind::Grpc, Arc::new(StaticAdapter))
    }

    fn config() -> FedConfig {
        let mut trigram =
            BackendConfig::new("zoekt", "http://127.0.0.1:6070", BackendKind::Trigram);
        trigram.name = Some("Zoekt".into());

        FedConfig {
            backends: vec![
                BackendConfig::new("linux", "http://127.0.0.1:9999", BackendKind::Grpc),
                trigram,
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_from_config_builds_all_kinds() {
        let registry = BackendRegistry::from_config(&config()).unwrap();

        let list = registry.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "linux");
        assert_eq!(list[0].kind, BackendKind::Grpc);
        assert_eq!(list[0].name, "linux");
        assert_eq!(list[1].kind, BackendKind::Trigram);
        assert_eq!(list[1].name, "Zoekt");
        assert!(!list[1].started);
    }

    #[tokio::test]
    async fn test_from_config_rejects_duplicates() {
        let mut config = config();
        config.backends.push(BackendConfig::new("linux", "http://other:1", BackendKind::Grpc));

        let err = BackendRegistry::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate backend id 'linux'"));
    }

    #[tokio::test]
    async fn test_from_config_reports_bad_address() {
        let mut config = config();
        config.backends[1].address = "not a url".into();

        let err = BackendRegistry::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("creating backend 'zoekt'"));
    }

    #[tokio::test]
    async fn test_get_unknown_backend() {
        let registry = BackendRegistry::new();
        let err = registry.get("nope").await.unwrap_err();
        assert!(matches!(err, BackendError::BackendNotFound { id } if id == "nope"));
    }

    #[tokio::test]
    async fn test_default_backend_selection() {
        let registry = BackendRegistry::new();
        assert!(registry.default_backend().await.is_err());

        registry.register(static_backend("a")).await.unwrap();
        registry.register(static_backend("b")).await.unwrap();
        assert_eq!(registry.default_backend().await.unwrap().id(), "a");
        assert_eq!(registry.resolve(Some("b")).await.unwrap().id(), "b");

        let registry = registry.with_default("b");
        assert_eq!(registry.resolve(None).await.unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate() {
        let registry = BackendRegistry::new();
        registry.register(static_backend("a")).await.unwrap();
        assert!(registry.register(static_backend("a")).await.is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_start_and_shutdown_all() {
        let registry = BackendRegistry::new();
        registry.register(static_backend("a")).await.unwrap();
        registry.register(static_backend("b")).await.unwrap();

        registry.start_all().await;
        tokio::task::yield_now().await;
        assert!(registry.list().await.iter().all(|b| b.started));

        tokio::time::timeout(Duration::from_secs(5), registry.shutdown_all())
            .await
            .expect("shutdown hung");
        assert!(registry.list().await.iter().all(|b| !b.started));
    }

    #[tokio::test]
    async fn test_unregister_stops_backend() {
        let registry = BackendRegistry::new();
        let backend = registry.register(static_backend("a")).await.unwrap();
        backend.start().await;

        assert!(registry.unregister("a").await);
        assert!(!backend.is_started().await);
        assert!(registry.is_empty().await);
        assert!(!registry.unregister("a").await);
    }
}
