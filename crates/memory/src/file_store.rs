//! File-backed store: one JSONL file per collection.
//!
//! Each line is a JSON-encoded `StoredItem`. Records are loaded into memory
//! on creation and flushed to disk on every mutation: fast reads with
//! durable writes. Corrupted lines are skipped with a warning so a damaged
//! file degrades to a partial collection instead of a startup failure.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use ironmind_core::error::MemoryError;

use crate::store::{is_expired, keyword_query, QueryHit, StoredItem, VectorStore};

/// A collection persisted as JSONL under `.memory/<collection>.jsonl`.
pub struct FileStore {
    path: PathBuf,
    items: Arc<RwLock<Vec<StoredItem>>>,
}

impl FileStore {
    /// Open or create a collection file at the given path.
    pub fn new(path: PathBuf) -> Self {
        let items = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = items.len(), "File store loaded");
        Self {
            path,
            items: Arc::new(RwLock::new(items)),
        }
    }

    fn load_from_disk(path: &PathBuf) -> Vec<StoredItem> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // No file yet, start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredItem>(line) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupted store entry");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self) -> Result<(), MemoryError> {
        let items = self.items.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for item in items.iter() {
            let line = serde_json::to_string(item)
                .map_err(|e| MemoryError::Storage(format!("failed to serialize entry: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("failed to write store file: {e}")))
    }
}

#[async_trait]
impl VectorStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert(
        &self,
        id: &str,
        document: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), MemoryError> {
        {
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
        }
        self.flush().await
    }

    async fn query(&self, text: &str, n: usize) -> Result<Vec<QueryHit>, MemoryError> {
        let items = self.items.read().await;
        Ok(keyword_query(&items, text, n))
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let removed = {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|i| !ids.contains(&i.id));
            before - items.len()
        };
        if removed > 0 {
            self.flush().await?;
        }
        Ok(removed)
    }

    async fn delete_by(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Map<String, Value>) -> bool + Send + Sync),
    ) -> Result<usize, MemoryError> {
        let removed = {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|i| !predicate(&i.metadata));
            before - items.len()
        };
        if removed > 0 {
            self.flush().await?;
        }
        Ok(removed)
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
        let removed = {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|i| !is_expired(i, max_age_days, keep_successful));
            before - items.len()
        };
        if removed > 0 {
            self.flush().await?;
        }
        Ok(removed)
    }

    async fn limit_size(&self, max_count: usize) -> Result<usize, MemoryError> {
        let pruned = {
            let mut items = self.items.write().await;
            if items.len() <= max_count {
                0
            } else {
                items.sort_by_key(|i| i.ts());
                let excess = items.len() - max_count;
                items.drain(0..excess);
                excess
            }
        };
        if pruned > 0 {
            self.flush().await?;
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn meta_now() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("ts".into(), json!(Utc::now().to_rfc3339()));
        m
    }

    #[tokio::test]
    async fn store_and_reload_persists() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = FileStore::new(path.clone());
        store
            .upsert("f1", "[name] Budi", meta_now())
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Budi"));

        let store2 = FileStore::new(path);
        assert_eq!(store2.count().await.unwrap(), 1);
        let hits = store2.query("Budi", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "f1");
    }

    #[tokio::test]
    async fn delete_persists() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = FileStore::new(path.clone());
        store.upsert("a", "to be deleted", meta_now()).await.unwrap();
        assert_eq!(store.delete(&["a".to_string()]).await.unwrap(), 1);

        let store2 = FileStore::new(path);
        assert_eq!(store2.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let path = PathBuf::from("/tmp/ironmind_test_nonexistent_collection.jsonl");
        let _ = std::fs::remove_file(&path);
        let store = FileStore::new(path);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"id":"1","document":"valid","metadata":{{"ts":"2026-01-01T00:00:00Z"}}}}"#
        )
        .unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(
            tmp,
            r#"{{"id":"2","document":"also valid","metadata":{{"ts":"2026-01-02T00:00:00Z"}}}}"#
        )
        .unwrap();

        let store = FileStore::new(tmp.path().to_path_buf());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn upsert_replaces_on_disk() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = FileStore::new(path.clone());
        store.upsert("x", "first version", meta_now()).await.unwrap();
        store.upsert("x", "second version", meta_now()).await.unwrap();

        let store2 = FileStore::new(path);
        assert_eq!(store2.count().await.unwrap(), 1);
        assert_eq!(store2.all().await.unwrap()[0].document, "second version");
    }
}
