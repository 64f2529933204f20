//! Boundary to the platform that owns document content.
//!
//! A session is seeded from the store the first time its document is synced.
//! Writing merged content back is the platform's business.

use std::collections::HashMap;

use async_trait::async_trait;
use concord_core::{split, Granularity};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::state::DocumentKey;

/// Content store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store refused or failed to load the document
    #[error("failed to load {key}: {reason}")]
    Unavailable { key: DocumentKey, reason: String },
}

/// Source of the initial content of a document session.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load the current units of `key`. Unknown documents load as empty.
    async fn load(&self, key: &DocumentKey) -> Result<Vec<String>, StoreError>;
}

/// In-process content store.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    documents: RwLock<HashMap<DocumentKey, Vec<String>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text`, cut into units with `granularity`.
    pub async fn insert_text(&self, key: impl Into<DocumentKey>, text: &str, granularity: Granularity) {
        self.insert(key, split(text, granularity)).await;
    }

    /// Store raw units.
    pub async fn insert(&self, key: impl Into<DocumentKey>, units: Vec<String>) {
        self.documents.write().await.insert(key.into(), units);
    }

    /// Remove a document.
    pub async fn remove(&self, key: &DocumentKey) -> Option<Vec<String>> {
        self.documents.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn load(&self, key: &DocumentKey) -> Result<Vec<String>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}
