//! Typed memory records stored in the vector collections.
//!
//! Each record kind maps to one collection: experiences, lessons,
//! strategies, facts, errors. Records serialize into a searchable document
//! plus a scalar-only metadata map, which is what the store contract takes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A record of one completed task: input, actions, outcome, success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub task: String,
    pub actions: Vec<String>,
    pub outcome: String,
    pub success: bool,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Experience {
    pub fn new(task: impl Into<String>, actions: Vec<String>, outcome: impl Into<String>, success: bool) -> Self {
        Self {
            id: format!("exp_{}", Uuid::new_v4()),
            task: task.into(),
            actions,
            outcome: outcome.into(),
            success,
            ts: Utc::now(),
            meta: Map::new(),
        }
    }

    pub fn to_document(&self) -> String {
        format!(
            "Task: {}\nActions: {}\nOutcome: {}\nSuccess: {}",
            self.task,
            if self.actions.is_empty() {
                "none".to_string()
            } else {
                self.actions.join("; ")
            },
            self.outcome,
            self.success
        )
    }

    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("task".into(), truncated(&self.task, 500).into());
        m.insert("actions".into(), self.actions.join("; ").into());
        m.insert("outcome".into(), truncated(&self.outcome, 500).into());
        m.insert("success".into(), self.success.into());
        m.insert("action_count".into(), (self.actions.len() as u64).into());
        m.insert("ts".into(), self.ts.to_rfc3339().into());
        for (k, v) in &self.meta {
            if is_scalar(v) && !m.contains_key(k) {
                m.insert(k.clone(), v.clone());
            }
        }
        m
    }
}

/// Summarized guidance derived from experiences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub lesson: String,
    pub context: String,
    pub category: String,
    /// Importance in [0, 1]
    pub importance: f32,
    pub ts: DateTime<Utc>,
}

impl Lesson {
    pub fn new(lesson: impl Into<String>, context: impl Into<String>, category: impl Into<String>, importance: f32) -> Self {
        Self {
            id: format!("lesson_{}", Uuid::new_v4()),
            lesson: lesson.into(),
            context: context.into(),
            category: category.into(),
            importance: importance.clamp(0.0, 1.0),
            ts: Utc::now(),
        }
    }

    pub fn to_document(&self) -> String {
        format!("{}\nContext: {}\nCategory: {}", self.lesson, self.context, self.category)
    }

    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("lesson".into(), self.lesson.clone().into());
        m.insert("context".into(), truncated(&self.context, 500).into());
        m.insert("category".into(), self.category.clone().into());
        m.insert("importance".into(), (self.importance as f64).into());
        m.insert("ts".into(), self.ts.to_rfc3339().into());
        m
    }
}

/// A proven approach for a class of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub strategy: String,
    pub task_type: String,
    /// Success rate in [0, 1]
    pub success_rate: f32,
    pub usage_count: u32,
    pub ts: DateTime<Utc>,
}

impl Strategy {
    pub fn new(strategy: impl Into<String>, task_type: impl Into<String>, success_rate: f32) -> Self {
        Self {
            id: format!("strat_{}", Uuid::new_v4()),
            strategy: strategy.into(),
            task_type: task_type.into(),
            success_rate: success_rate.clamp(0.0, 1.0),
            usage_count: 1,
            ts: Utc::now(),
        }
    }

    pub fn to_document(&self) -> String {
        format!("Strategy: {}\nTask type: {}", self.strategy, self.task_type)
    }

    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("strategy".into(), self.strategy.clone().into());
        m.insert("task_type".into(), self.task_type.clone().into());
        m.insert("success_rate".into(), (self.success_rate as f64).into());
        m.insert("usage_count".into(), (self.usage_count as u64).into());
        m.insert("ts".into(), self.ts.to_rfc3339().into());
        m
    }
}

/// A durable statement about the user carried across tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub fact: String,
    pub category: String,
    pub value: String,
    pub ts: DateTime<Utc>,
}

impl Fact {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            id: format!("fact_{}", Uuid::new_v4()),
            fact: value.clone(),
            category: category.into(),
            value,
            ts: Utc::now(),
        }
    }

    /// Keep the user's original phrasing as the searchable statement while
    /// `value` stays normalized for prompt injection.
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.fact = statement.into();
        self
    }

    pub fn to_document(&self) -> String {
        format!("[{}] {}", self.category, self.fact)
    }

    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("fact".into(), self.fact.clone().into());
        m.insert("category".into(), self.category.clone().into());
        m.insert("value".into(), self.value.clone().into());
        m.insert("ts".into(), self.ts.to_rfc3339().into());
        m
    }
}

/// Severity of a remediation suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// What kind of action a remediation suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Validate,
    Config,
    Permission,
    Install,
    Manual,
}

/// An actionable suggestion attached to an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    pub suggestion: String,
    pub severity: Severity,
    pub action_kind: ActionKind,
    pub auto_fixable: bool,
}

/// A logged tool or LLM failure with rich metadata for pattern analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub id: String,
    pub tool: String,
    pub operation: String,
    pub error: String,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
}

impl ErrorEvent {
    pub fn new(tool: impl Into<String>, operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: format!("err_{}", Uuid::new_v4()),
            tool: tool.into(),
            operation: operation.into(),
            error: error.into(),
            ts: Utc::now(),
            meta: Map::new(),
            remediation: None,
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn to_document(&self) -> String {
        let mut doc = format!("{} {}: {}", self.tool, self.operation, self.error);
        if !self.meta.is_empty() {
            let ctx: Vec<String> = self
                .meta
                .iter()
                .map(|(k, v)| format!("{k}={}", scalar_to_string(v)))
                .collect();
            doc.push_str(&format!(" | Context: {}", ctx.join(" ")));
        }
        doc
    }

    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("tool".into(), self.tool.clone().into());
        m.insert("operation".into(), self.operation.clone().into());
        m.insert("error".into(), truncated(&self.error, 500).into());
        m.insert("ts".into(), self.ts.to_rfc3339().into());
        for (k, v) in &self.meta {
            if is_scalar(v) && !m.contains_key(k) {
                m.insert(k.clone(), v.clone());
            }
        }
        m
    }
}

/// Collection metadata only admits scalar values.
fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncated(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experience_document_includes_actions() {
        let exp = Experience::new(
            "read a file",
            vec!["filesystem.read".into()],
            "done",
            true,
        );
        let doc = exp.to_document();
        assert!(doc.contains("filesystem.read"));
        assert!(doc.contains("read a file"));
    }

    #[test]
    fn experience_metadata_is_scalar_only() {
        let mut exp = Experience::new("task", vec![], "outcome", false);
        exp.meta.insert("nested".into(), serde_json::json!({"a": 1}));
        exp.meta.insert("flag".into(), serde_json::json!(true));

        let meta = exp.to_metadata();
        assert!(!meta.contains_key("nested"));
        assert_eq!(meta["flag"], true);
        assert_eq!(meta["success"], false);
        assert!(meta.contains_key("ts"));
    }

    #[test]
    fn lesson_importance_clamped() {
        let lesson = Lesson::new("check paths first", "file ops", "validation", 3.5);
        assert_eq!(lesson.importance, 1.0);
    }

    #[test]
    fn fact_document_labels_category() {
        let fact = Fact::new("name", "Budi");
        assert_eq!(fact.to_document(), "[name] Budi");
    }

    #[test]
    fn error_event_document_carries_context() {
        let mut meta = Map::new();
        meta.insert("path".into(), "notes.txt".into());
        let event = ErrorEvent::new("filesystem", "read", "file does not exist").with_meta(meta);

        let doc = event.to_document();
        assert!(doc.contains("filesystem read"));
        assert!(doc.contains("path=notes.txt"));
    }

    #[test]
    fn ids_are_unique() {
        let a = Fact::new("name", "Budi");
        let b = Fact::new("name", "Budi");
        assert_ne!(a.id, b.id);
    }
}
