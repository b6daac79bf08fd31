//! Deterministic rule engine, checked before any LLM reasoning.
//!
//! Rules are a keyed list persisted as JSON. Matching is first-match-wins
//! over rules ordered by descending priority, then descending creation
//! time. Persistence is rewritten atomically on every mutation; a missing
//! or corrupt file means starting empty, never failing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ironmind_core::error::MemoryError;
use ironmind_core::rule::{Rule, RuleMatch, TriggerKind};

#[derive(Serialize, Deserialize)]
struct RuleFile {
    rules: Vec<Rule>,
}

/// Engine managing user-defined rules.
pub struct RuleEngine {
    rules: RwLock<Vec<Rule>>,
    /// None = no persistence (ephemeral sessions and tests)
    path: Option<PathBuf>,
}

impl RuleEngine {
    /// Ephemeral engine with no persistence.
    pub fn in_memory() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Engine persisted at `<workspace>/.memory/rules.json`.
    pub fn persistent(working_directory: &std::path::Path) -> Self {
        let path = working_directory.join(".memory").join("rules.json");
        let rules = Self::load(&path);
        info!(count = rules.len(), path = %path.display(), "Rule engine loaded");
        Self {
            rules: RwLock::new(rules),
            path: Some(path),
        }
    }

    fn load(path: &PathBuf) -> Vec<Rule> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<RuleFile>(&content) {
            Ok(file) => {
                let mut rules = file.rules;
                Self::sort(&mut rules);
                rules
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt rules file, starting empty");
                Vec::new()
            }
        }
    }

    /// Atomic rewrite: serialize to a temp file in the same directory, then
    /// rename over the target.
    fn save(&self, rules: &[Rule]) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemoryError::Storage(format!("failed to create rules dir: {e}")))?;
        }

        let content = serde_json::to_string_pretty(&RuleFile {
            rules: rules.to_vec(),
        })
        .map_err(|e| MemoryError::Storage(format!("failed to serialize rules: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .map_err(|e| MemoryError::Storage(format!("failed to write rules: {e}")))?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| MemoryError::Storage(format!("failed to replace rules file: {e}")))?;
        Ok(())
    }

    fn sort(rules: &mut [Rule]) {
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.created_at.cmp(&a.created_at))
        });
    }

    /// Add a rule. The trigger is validated for its kind; invalid regex
    /// patterns are rejected here.
    pub fn add(
        &self,
        trigger: impl Into<String>,
        trigger_kind: TriggerKind,
        response: impl Into<String>,
        priority: i32,
    ) -> Result<String, MemoryError> {
        let trigger = trigger.into();
        Rule::validate_trigger(&trigger, trigger_kind)?;

        let rule = Rule {
            id: format!("rule_{}", Uuid::new_v4()),
            trigger,
            trigger_kind,
            response: response.into(),
            priority,
            created_at: Utc::now(),
        };
        let id = rule.id.clone();

        let mut rules = self.rules.write().expect("rule lock poisoned");
        info!(rule_id = %id, trigger = %rule.trigger, "Rule added");
        rules.push(rule);
        Self::sort(&mut rules);
        self.save(&rules)?;
        Ok(id)
    }

    /// Remove a rule by id. Returns whether anything was removed.
    pub fn remove(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write().expect("rule lock poisoned");
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        let removed = rules.len() < before;
        if removed {
            if let Err(e) = self.save(&rules) {
                warn!(error = %e, "Failed to persist rule removal");
            }
            info!(rule_id, "Rule removed");
        }
        removed
    }

    /// Check raw user input against all rules. First match wins.
    pub fn match_input(&self, input: &str) -> Option<RuleMatch> {
        let rules = self.rules.read().expect("rule lock poisoned");
        for rule in rules.iter() {
            if rule.matches(input) {
                debug!(rule_id = %rule.id, trigger = %rule.trigger, "Rule matched");
                return Some(RuleMatch {
                    rule_id: rule.id.clone(),
                    response: rule.response.clone(),
                });
            }
        }
        None
    }

    /// All rules in match order.
    pub fn all(&self) -> Vec<Rule> {
        self.rules.read().expect("rule lock poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.rules.read().expect("rule lock poisoned").len()
    }

    /// Remove every rule. Returns how many were cleared.
    pub fn clear(&self) -> usize {
        let mut rules = self.rules.write().expect("rule lock poisoned");
        let count = rules.len();
        rules.clear();
        if let Err(e) = self.save(&rules) {
            warn!(error = %e, "Failed to persist rule clear");
        }
        count
    }

    /// Export all rules to a JSON file.
    pub fn export(&self, path: &std::path::Path) -> Result<usize, MemoryError> {
        let rules = self.all();
        let content = serde_json::to_string_pretty(&RuleFile {
            rules: rules.clone(),
        })
        .map_err(|e| MemoryError::Storage(format!("failed to serialize rules: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| MemoryError::Storage(format!("failed to write export: {e}")))?;
        Ok(rules.len())
    }

    /// Import rules from a JSON file produced by `export`. Returns how many
    /// were imported.
    pub fn import(&self, path: &std::path::Path) -> Result<usize, MemoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::Storage(format!("failed to read import: {e}")))?;
        let file: RuleFile = serde_json::from_str(&content)
            .map_err(|e| MemoryError::Storage(format!("failed to parse import: {e}")))?;

        let count = file.rules.len();
        let mut rules = self.rules.write().expect("rule lock poisoned");
        rules.extend(file.rules);
        Self::sort(&mut rules);
        self.save(&rules)?;
        info!(count, "Rules imported");
        Ok(count)
    }
}
