//! The VectorStore trait shared by all memory collections.
//!
//! The contract is deliberately narrow: upsert by id, similarity query,
//! id-based and predicate deletion, and the two hygiene operations. The
//! similarity backend is a black box; when it is absent, the keyword
//! fallback in this module satisfies the same contract.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ironmind_core::error::MemoryError;

/// One stored record: a searchable document plus scalar metadata.
///
/// `metadata` always contains a `ts` key (RFC 3339 string).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
}

impl StoredItem {
    /// The record timestamp, parsed from metadata. Records without a
    /// parseable `ts` sort as oldest.
    pub fn ts(&self) -> DateTime<Utc> {
        self.metadata
            .get("ts")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// The `success` metadata flag, defaulting to false.
    pub fn success(&self) -> bool {
        self.metadata
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// A similarity query result. Smaller distance = more similar.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub distance: f32,
}

/// The per-collection store contract.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name ("in_memory", "file").
    fn name(&self) -> &str;

    /// Insert or replace a record by id.
    async fn upsert(
        &self,
        id: &str,
        document: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), MemoryError>;

    /// Query the n most similar records to the given text.
    async fn query(&self, text: &str, n: usize) -> Result<Vec<QueryHit>, MemoryError>;

    /// Delete records by id. Returns how many were removed.
    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError>;

    /// Delete records whose metadata matches the predicate.
    async fn delete_by(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Map<String, Value>) -> bool + Send + Sync),
    ) -> Result<usize, MemoryError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, MemoryError>;

    /// Fetch all records (for analysis and export).
    async fn all(&self) -> Result<Vec<StoredItem>, MemoryError>;

    /// Remove records older than `max_age_days`. With `keep_successful`,
    /// records whose metadata marks them successful survive regardless of
    /// age. Returns the number deleted.
    async fn cleanup_old(&self, max_age_days: i64, keep_successful: bool)
        -> Result<usize, MemoryError>;

    /// Shrink the collection to at most `max_count` records, dropping the
    /// oldest `ts` first. Returns the number pruned.
    async fn limit_size(&self, max_count: usize) -> Result<usize, MemoryError>;
}

/// Keyword-match fallback scoring, shared by both backends.
///
/// Scores by occurrence density of the query in the document
/// (case-insensitive), then converts to a distance where smaller means
/// more similar. Non-matching records are excluded.
pub(crate) fn keyword_query(items: &[StoredItem], text: &str, n: usize) -> Vec<QueryHit> {
    let needle = text.to_lowercase();
    if needle.trim().is_empty() {
        return Vec::new();
    }

    // Score whole-query first; fall back to per-word matching so multi-word
    // task descriptions still hit single-word documents.
    let words: Vec<&str> = needle.split_whitespace().collect();

    let mut hits: Vec<QueryHit> = items
        .iter()
        .filter_map(|item| {
            let haystack = item.document.to_lowercase();
            let whole = haystack.matches(&needle).count();
            let score = if whole > 0 {
                whole as f32 / (haystack.len() as f32 / 100.0).max(1.0)
            } else {
                let word_hits = words
                    .iter()
                    .filter(|w| w.len() > 2 && haystack.contains(*w))
                    .count();
                if word_hits == 0 {
                    return None;
                }
                0.5 * word_hits as f32 / words.len().max(1) as f32
            };
            Some(QueryHit {
                id: item.id.clone(),
                document: item.document.clone(),
                metadata: item.metadata.clone(),
                distance: 1.0 / (1.0 + score),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(n);
    hits
}

/// Shared cleanup predicate: true when the item should be deleted.
pub(crate) fn is_expired(item: &StoredItem, max_age_days: i64, keep_successful: bool) -> bool {
    let cutoff = Utc::now() - Duration::days(max_age_days);
    if item.ts() >= cutoff {
        return false;
    }
    !(keep_successful && item.success())
}
