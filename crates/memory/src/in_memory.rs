//! In-memory store, used for tests and when persistence is disabled.
//!
//! Satisfies the full collection contract with the keyword-match fallback
//! for queries. Persistence is a no-op by construction, which callers of
//! `MemoryStores::in_memory` accept explicitly.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use ironmind_core::error::MemoryError;

use crate::store::{is_expired, keyword_query, QueryHit, StoredItem, VectorStore};

/// A collection held entirely in process memory.
pub struct InMemoryStore {
    items: Arc<RwLock<Vec<StoredItem>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(
        &self,
        id: &str,
        document: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), MemoryError> {
        let mut items = self.items.write().await;
        let new_item = StoredItem {
            id: id.to_string(),
            document: document.to_string(),
            metadata,
        };
        match items.iter_mut().find(|i| i.id == id) {
            Some(existing) => *existing = new_item,
            None => items.push(new_item),
        }
        Ok(())
    }

    async fn query(&self, text: &str, n: usize) -> Result<Vec<QueryHit>, MemoryError> {
        let items = self.items.read().await;
        Ok(keyword_query(&items, text, n))
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !ids.contains(&i.id));
        Ok(before - items.len())
    }

    async fn delete_by(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Map<String, Value>) -> bool + Send + Sync),
    ) -> Result<usize, MemoryError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !predicate(&i.metadata));
        Ok(before - items.len())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.items.read().await.len())
    }

    async fn all(&self) -> Result<Vec<StoredItem>, MemoryError> {
        Ok(self.items.read().await.clone())
    }

    async fn cleanup_old(
        &self,
        max_age_days: i64,
        keep_successful: bool,
    ) -> Result<usize, MemoryError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !is_expired(i, max_age_days, keep_successful));
        Ok(before - items.len())
    }

    async fn limit_size(&self, max_count: usize) -> Result<usize, MemoryError> {
        let mut items = self.items.write().await;
        if items.len() <= max_count {
            return Ok(0);
        }
        // Drop oldest first
        items.sort_by_key(|i| i.ts());
        let excess = items.len() - max_count;
        items.drain(0..excess);
        Ok(excess)
    }
}
