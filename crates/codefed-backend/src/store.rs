//! Per-backend metadata store.
//!
//! Holds the backend's display name, indexed trees and index time. The three
//! fields live in one snapshot behind one lock: a refresh replaces them in a
//! single write, and readers clone the whole snapshot, so nobody observes a
//! name from one refresh next to trees from another.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::types::Tree;

/// A consistent view of a backend's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// Display name
    pub name: String,

    /// Indexed trees, in backend-reported order
    pub trees: Arc<[Tree]>,

    /// When the remote index was last built, if known
    pub index_time: Option<DateTime<Utc>>,
}

/// Fields a refresh may change. `None` leaves the current value in place.
#[derive(Debug, Clone, Default)]
pub struct IndexUpdate {
    pub name: Option<String>,
    pub trees: Option<Vec<Tree>>,
    pub index_time: Option<DateTime<Utc>>,
}

impl IndexUpdate {
    /// True when applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.trees.is_none() && self.index_time.is_none()
    }
}

/// Lock-protected metadata for one backend.
#[derive(Debug)]
pub struct IndexInfo {
    inner: RwLock<IndexSnapshot>,
}

impl IndexInfo {
    /// Create an empty store whose display name is `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(IndexSnapshot {
                name: name.into(),
                ..Default::default()
            }),
        }
    }

    /// Read the current metadata.
    pub async fn snapshot(&self) -> IndexSnapshot {
        self.inner.read().await.clone()
    }

    /// Current display name.
    pub async fn name(&self) -> String {
        self.inner.read().await.name.clone()
    }

    /// Current tree list.
    pub async fn trees(&self) -> Arc<[Tree]> {
        Arc::clone(&self.inner.read().await.trees)
    }

    /// Apply an update under a single write lock.
    pub async fn apply(&self, update: IndexUpdate) {
        if update.is_empty() {
            return;
        }

        let mut guard = self.inner.write().await;
        if let Some(name) = update.name {
            guard.name = name;
        }
        if let Some(trees) = update.trees {
            guard.trees = trees.into();
        }
        if let Some(index_time) = update.index_time {
            guard.index_time = Some(index_time);
        }
    }
}
