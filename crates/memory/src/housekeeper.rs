//! Periodic memory hygiene.
//!
//! The reasoner invokes this on an explicit task counter. One run sweeps
//! every collection: age-based cleanup (keeping successful records), then
//! size caps dropping the oldest records first. The run emits one
//! structured log record with the counts.

use tracing::{info, warn};

use crate::stores::MemoryStores;

/// Size caps per collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionCaps {
    pub experiences: usize,
    pub lessons: usize,
    pub strategies: usize,
    pub facts: usize,
    pub errors: usize,
}

impl Default for CollectionCaps {
    fn default() -> Self {
        Self {
            experiences: 500,
            lessons: 500,
            strategies: 500,
            facts: 500,
            errors: 1000,
        }
    }
}

/// Per-collection counts from one hygiene run.
#[derive(Debug, Clone, Default)]
pub struct HygieneReport {
    /// (collection, removed by age)
    pub expired: Vec<(&'static str, usize)>,
    /// (collection, removed by size cap)
    pub pruned: Vec<(&'static str, usize)>,
}

impl HygieneReport {
    pub fn total_removed(&self) -> usize {
        self.expired.iter().map(|(_, n)| n).sum::<usize>()
            + self.pruned.iter().map(|(_, n)| n).sum::<usize>()
    }
}

/// Drives periodic cleanup of the memory collections.
pub struct Housekeeper {
    stores: MemoryStores,
    max_age_days: i64,
    caps: CollectionCaps,
}

impl Housekeeper {
    pub fn new(stores: MemoryStores, max_age_days: i64, caps: CollectionCaps) -> Self {
        Self {
            stores,
            max_age_days,
            caps,
        }
    }

    /// Run one hygiene sweep over all collections.
    pub async fn run(&self) -> HygieneReport {
        let mut report = HygieneReport::default();

        for (name, store) in self.stores.named() {
            match store.cleanup_old(self.max_age_days, true).await {
                Ok(n) if n > 0 => report.expired.push((name, n)),
                Ok(_) => {}
                Err(e) => warn!(collection = name, error = %e, "Age cleanup failed"),
            }

            let cap = self.cap_for(name);
            match store.limit_size(cap).await {
                Ok(n) if n > 0 => report.pruned.push((name, n)),
                Ok(_) => {}
                Err(e) => warn!(collection = name, error = %e, "Size cap failed"),
            }
        }

        info!(
            removed = report.total_removed(),
            expired = ?report.expired,
            pruned = ?report.pruned,
            "Memory hygiene run complete"
        );
        report
    }

    fn cap_for(&self, collection: &str) -> usize {
        match collection {
            "experiences" => self.caps.experiences,
            "lessons" => self.caps.lessons,
            "strategies" => self.caps.strategies,
            "facts" => self.caps.facts,
            "errors" => self.caps.errors,
            _ => self.caps.experiences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map, Value};

    fn meta_at(days_ago: i64, success: bool) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(
            "ts".into(),
            json!((Utc::now() - Duration::days(days_ago)).to_rfc3339()),
        );
        m.insert("success".into(), json!(success));
        m
    }

    #[tokio::test]
    async fn run_removes_old_failures_and_keeps_successes() {
        let stores = MemoryStores::in_memory();
        stores
            .experiences
            .upsert("old_fail", "doc", meta_at(120, false))
            .await
            .unwrap();
        stores
            .experiences
            .upsert("old_ok", "doc", meta_at(120, true))
            .await
            .unwrap();
        stores
            .experiences
            .upsert("fresh", "doc", meta_at(1, false))
            .await
            .unwrap();

        let keeper = Housekeeper::new(stores.clone(), 90, CollectionCaps::default());
        let report = keeper.run().await;

        assert_eq!(report.expired, vec![("experiences", 1)]);
        assert_eq!(stores.experiences.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn run_enforces_size_caps() {
        let stores = MemoryStores::in_memory();
        for i in 0..5 {
            stores
                .facts
                .upsert(&format!("f{i}"), "doc", meta_at(i, true))
                .await
                .unwrap();
        }

        let caps = CollectionCaps {
            facts: 2,
            ..CollectionCaps::default()
        };
        let keeper = Housekeeper::new(stores.clone(), 365, caps);
        let report = keeper.run().await;

        assert_eq!(report.pruned, vec![("facts", 3)]);
        assert_eq!(stores.facts.count().await.unwrap(), 2);

        // Newest survive
        let remaining: Vec<String> = stores
            .facts
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert!(remaining.contains(&"f0".to_string()));
        assert!(remaining.contains(&"f1".to_string()));
    }

    #[tokio::test]
    async fn quiet_run_reports_nothing() {
        let stores = MemoryStores::in_memory();
        let keeper = Housekeeper::new(stores, 90, CollectionCaps::default());
        let report = keeper.run().await;
        assert_eq!(report.total_removed(), 0);
        assert!(report.expired.is_empty());
        assert!(report.pruned.is_empty());
    }
}
