//! Context retrieval: assembles the typed memory bundle for a task.
//!
//! Rules are always returned in full; the other collections are queried by
//! similarity against the task text. A failing or absent similarity backend
//! degrades to empty lists, never to an error; rules still flow.

use std::sync::Arc;
use tracing::{debug, warn};

use ironmind_core::rule::{Rule, TriggerKind};

use crate::rule_engine::RuleEngine;
use crate::store::QueryHit;
use crate::stores::MemoryStores;

/// Retrieval depth per collection.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalLimits {
    pub facts: usize,
    pub experiences: usize,
    pub lessons: usize,
    pub strategies: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            facts: 5,
            experiences: 3,
            lessons: 3,
            strategies: 3,
        }
    }
}

/// Everything retrieved for one task.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    pub rules: Vec<Rule>,
    pub facts: Vec<QueryHit>,
    pub experiences: Vec<QueryHit>,
    pub lessons: Vec<QueryHit>,
    pub strategies: Vec<QueryHit>,
}

impl MemoryBundle {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
            && self.facts.is_empty()
            && self.experiences.is_empty()
            && self.lessons.is_empty()
            && self.strategies.is_empty()
    }
}

/// Retrieves and renders memory context for injection into the system prompt.
pub struct Retriever {
    rule_engine: Arc<RuleEngine>,
    stores: MemoryStores,
    limits: RetrievalLimits,
}

impl Retriever {
    pub fn new(rule_engine: Arc<RuleEngine>, stores: MemoryStores, limits: RetrievalLimits) -> Self {
        Self {
            rule_engine,
            stores,
            limits,
        }
    }

    /// Retrieve the typed bundle for a task.
    pub async fn for_task(&self, task: &str) -> MemoryBundle {
        let bundle = MemoryBundle {
            rules: self.rule_engine.all(),
            facts: self.query(&self.stores.facts, task, self.limits.facts, "facts").await,
            experiences: self
                .query(&self.stores.experiences, task, self.limits.experiences, "experiences")
                .await,
            lessons: self
                .query(&self.stores.lessons, task, self.limits.lessons, "lessons")
                .await,
            strategies: self
                .query(&self.stores.strategies, task, self.limits.strategies, "strategies")
                .await,
        };

        debug!(
            rules = bundle.rules.len(),
            facts = bundle.facts.len(),
            experiences = bundle.experiences.len(),
            lessons = bundle.lessons.len(),
            strategies = bundle.strategies.len(),
            "Memory retrieved for task"
        );
        bundle
    }

    async fn query(
        &self,
        store: &Arc<dyn crate::store::VectorStore>,
        task: &str,
        n: usize,
        collection: &str,
    ) -> Vec<QueryHit> {
        if n == 0 {
            return Vec::new();
        }
        match store.query(task, n).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(collection, error = %e, "Memory query failed, continuing without");
                Vec::new()
            }
        }
    }

    /// Render the bundle as a stable, labeled block for the system prompt.
    /// Returns an empty string when there is nothing to inject.
    pub fn render(bundle: &MemoryBundle) -> String {
        if bundle.is_empty() {
            return String::new();
        }

        let mut out = String::from("\n\n## Retrieved Memory\n");

        if !bundle.rules.is_empty() {
            out.push_str("\n### Permanent Rules (always follow these)\n");
            for (i, rule) in bundle.rules.iter().enumerate() {
                let condition = match rule.trigger_kind {
                    TriggerKind::Exact => format!("user says exactly '{}'", rule.trigger),
                    TriggerKind::Contains => format!("user input contains '{}'", rule.trigger),
                    TriggerKind::Regex => format!("user input matches /{}/", rule.trigger),
                };
                out.push_str(&format!(
                    "{}. WHEN {} THEN respond: {}\n",
                    i + 1,
                    condition,
                    rule.response
                ));
            }
        }

        if !bundle.facts.is_empty() {
            out.push_str("\n### Known Facts About the User\n");
            for (i, hit) in bundle.facts.iter().enumerate() {
                let category = hit
                    .metadata
                    .get("category")
                    .and_then(|v| v.as_str())
                    .unwrap_or("general");
                let value = hit
                    .metadata
                    .get("value")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&hit.document);
                out.push_str(&format!("{}. [{}] {}\n", i + 1, category, value));
            }
        }

        if !bundle.experiences.is_empty() {
            out.push_str("\n### Similar Past Tasks\n");
            for (i, hit) in bundle.experiences.iter().enumerate() {
                let success = hit
                    .metadata
                    .get("success")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let outcome = hit
                    .metadata
                    .get("outcome")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let task = hit
                    .metadata
                    .get("task")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&hit.document);
                out.push_str(&format!(
                    "{}. [{}] Task: {} | Result: {}\n",
                    i + 1,
                    if success { "succeeded" } else { "failed" },
                    task,
                    outcome
                ));
            }
        }

        if !bundle.lessons.is_empty() {
            out.push_str("\n### Lessons Learned\n");
            for (i, hit) in bundle.lessons.iter().enumerate() {
                let lesson = hit
                    .metadata
                    .get("lesson")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&hit.document);
                out.push_str(&format!("{}. {}\n", i + 1, lesson));
            }
        }

        if !bundle.strategies.is_empty() {
            out.push_str("\n### Proven Strategies\n");
            for (i, hit) in bundle.strategies.iter().enumerate() {
                let strategy = hit
                    .metadata
                    .get("strategy")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&hit.document);
                let rate = hit
                    .metadata
                    .get("success_rate")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                out.push_str(&format!(
                    "{}. [{:.0}% success] {}\n",
                    i + 1,
                    rate * 100.0,
                    strategy
                ));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironmind_core::record::{Experience, Fact};

    async fn seeded() -> Retriever {
        let stores = MemoryStores::in_memory();
        let rules = Arc::new(RuleEngine::in_memory());
        rules
            .add("cekrek", TriggerKind::Contains, "memori terbaca", 0)
            .unwrap();

        let fact = Fact::new("name", "User's name is Budi");
        stores
            .facts
            .upsert(&fact.id, &fact.to_document(), fact.to_metadata())
            .await
            .unwrap();

        let exp = Experience::new(
            "baca file README.md",
            vec!["filesystem.read".into()],
            "file read successfully",
            true,
        );
        stores
            .experiences
            .upsert(&exp.id, &exp.to_document(), exp.to_metadata())
            .await
            .unwrap();

        Retriever::new(rules, stores, RetrievalLimits::default())
    }

    #[tokio::test]
    async fn rules_always_returned() {
        let retriever = seeded().await;
        let bundle = retriever.for_task("completely unrelated query xyz").await;
        assert_eq!(bundle.rules.len(), 1);
        // Nothing matched semantically
        assert!(bundle.facts.is_empty());
    }

    #[tokio::test]
    async fn similar_records_retrieved() {
        let retriever = seeded().await;
        let bundle = retriever.for_task("what is the user's name").await;
        assert_eq!(bundle.facts.len(), 1);
        assert!(bundle.facts[0].document.contains("Budi"));
    }

    #[tokio::test]
    async fn render_labels_sections() {
        let retriever = seeded().await;
        let bundle = retriever.for_task("baca file README.md").await;
        let text = Retriever::render(&bundle);

        assert!(text.contains("Permanent Rules"));
        assert!(text.contains("cekrek"));
        assert!(text.contains("Similar Past Tasks"));
        // Stable ordering: rules before experiences
        let rules_pos = text.find("Permanent Rules").unwrap();
        let exp_pos = text.find("Similar Past Tasks").unwrap();
        assert!(rules_pos < exp_pos);
    }

    #[tokio::test]
    async fn empty_bundle_renders_empty() {
        let stores = MemoryStores::in_memory();
        let rules = Arc::new(RuleEngine::in_memory());
        let retriever = Retriever::new(rules, stores, RetrievalLimits::default());

        let bundle = retriever.for_task("anything").await;
        assert!(bundle.is_empty());
        assert_eq!(Retriever::render(&bundle), "");
    }
}
