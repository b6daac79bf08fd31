//! Error memory: logging, pattern analysis, and remediation for failures.
//!
//! Every tool or LLM failure is logged here before it surfaces to the LLM
//! as an observation. Events land in two places: the `errors` collection
//! (for similarity lookups) and an append-only JSON audit file. A keyword
//! catalog maps error messages to actionable remediation suggestions, and
//! the analyzer aggregates failure patterns across tools, operations,
//! extensions, and paths.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use ironmind_core::record::{ActionKind, ErrorEvent, Remediation, Severity};

use crate::store::VectorStore;

/// Pre-flight advice computed from similar past errors.
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    pub warnings: Vec<String>,
    pub recommended_validations: Vec<String>,
    /// Confidence in [0, 1], scaled by how many similar errors exist.
    pub confidence: f32,
}

impl Preflight {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.recommended_validations.is_empty()
    }
}

/// A path that keeps failing.
#[derive(Debug, Clone)]
pub struct PathIssue {
    pub path: String,
    pub error_count: usize,
    pub samples: Vec<String>,
}

/// A pattern-derived recommendation in an analysis report.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub action: String,
}

/// Aggregated error patterns over a time window.
#[derive(Debug, Clone, Default)]
pub struct PatternReport {
    pub total: usize,
    pub by_tool: Vec<(String, usize)>,
    pub by_operation: Vec<(String, usize)>,
    pub top_error_types: Vec<(String, usize)>,
    pub by_extension: Vec<(String, usize)>,
    pub problematic_paths: Vec<PathIssue>,
    pub recommendations: Vec<Recommendation>,
}

/// One entry in the remediation catalog.
///
/// A pattern matches iff every keyword appears in the error string
/// (case-insensitive) and the optional tool/operation filters hold.
/// First match wins.
struct CatalogPattern {
    keywords: &'static [&'static str],
    tool: Option<&'static str>,
    operation: Option<&'static str>,
    suggestion: &'static str,
    severity: Severity,
    action_kind: ActionKind,
    auto_fixable: bool,
}

const CATALOG: &[CatalogPattern] = &[
    // File existence
    CatalogPattern {
        keywords: &["does not exist"],
        tool: None,
        operation: None,
        suggestion: "Create the missing file first, or verify the path is correct: {path}",
        severity: Severity::Medium,
        action_kind: ActionKind::Create,
        auto_fixable: true,
    },
    CatalogPattern {
        keywords: &["no such file"],
        tool: None,
        operation: None,
        suggestion: "Create the missing file first, or verify the path is correct: {path}",
        severity: Severity::Medium,
        action_kind: ActionKind::Create,
        auto_fixable: true,
    },
    CatalogPattern {
        keywords: &["file not found"],
        tool: None,
        operation: None,
        suggestion: "Check that the file path is correct. Use the list operation to see available files.",
        severity: Severity::Medium,
        action_kind: ActionKind::Validate,
        auto_fixable: false,
    },
    // Permissions and safety
    CatalogPattern {
        keywords: &["permission", "denied"],
        tool: None,
        operation: None,
        suggestion: "Check file permissions, or disable sandbox mode if the path is intentionally outside the workspace",
        severity: Severity::High,
        action_kind: ActionKind::Permission,
        auto_fixable: false,
    },
    CatalogPattern {
        keywords: &["blocked path"],
        tool: None,
        operation: None,
        suggestion: "Path {path} is in blocked_paths. Remove it from the blocked_paths setting if access is needed.",
        severity: Severity::High,
        action_kind: ActionKind::Config,
        auto_fixable: false,
    },
    CatalogPattern {
        keywords: &["outside", "workspace"],
        tool: None,
        operation: None,
        suggestion: "Path is outside the workspace. Set sandbox_mode = false to allow access (use with caution).",
        severity: Severity::High,
        action_kind: ActionKind::Config,
        auto_fixable: false,
    },
    // Size and extension limits
    CatalogPattern {
        keywords: &["too large"],
        tool: Some("filesystem"),
        operation: None,
        suggestion: "File is {file_size}, limit is {max_size}. Split the file or raise max_file_size_mb.",
        severity: Severity::Medium,
        action_kind: ActionKind::Config,
        auto_fixable: false,
    },
    CatalogPattern {
        keywords: &["extension", "not allowed"],
        tool: Some("filesystem"),
        operation: None,
        suggestion: "Extension {extension} is not allowed. Add it to allowed_extensions or use an allowed format.",
        severity: Severity::Low,
        action_kind: ActionKind::Config,
        auto_fixable: false,
    },
    // Directory shape
    CatalogPattern {
        keywords: &["not a directory"],
        tool: None,
        operation: None,
        suggestion: "The path points to a file, not a directory. Use the parent directory path instead.",
        severity: Severity::Medium,
        action_kind: ActionKind::Validate,
        auto_fixable: false,
    },
    CatalogPattern {
        keywords: &["is a directory"],
        tool: None,
        operation: None,
        suggestion: "The path points to a directory, not a file. Specify a file path instead.",
        severity: Severity::Medium,
        action_kind: ActionKind::Validate,
        auto_fixable: false,
    },
    // Binary content
    CatalogPattern {
        keywords: &["binary"],
        tool: None,
        operation: None,
        suggestion: "The file is binary, not text. Convert it to a text format first.",
        severity: Severity::Low,
        action_kind: ActionKind::Manual,
        auto_fixable: false,
    },
    // Shell
    CatalogPattern {
        keywords: &["command not found"],
        tool: Some("shell"),
        operation: None,
        suggestion: "The command is not installed. Install it first or check the command name.",
        severity: Severity::Medium,
        action_kind: ActionKind::Install,
        auto_fixable: false,
    },
    CatalogPattern {
        keywords: &["timed out"],
        tool: Some("shell"),
        operation: None,
        suggestion: "The command took too long. Raise tool_timeout_seconds or optimize the command.",
        severity: Severity::Medium,
        action_kind: ActionKind::Config,
        auto_fixable: false,
    },
    // Network
    CatalogPattern {
        keywords: &["connection"],
        tool: None,
        operation: None,
        suggestion: "Network error. Check the internet connection and whether the target server is reachable.",
        severity: Severity::High,
        action_kind: ActionKind::Manual,
        auto_fixable: false,
    },
    CatalogPattern {
        keywords: &["404"],
        tool: Some("web_search"),
        operation: None,
        suggestion: "Resource not found. Verify the URL or search for alternative sources.",
        severity: Severity::Medium,
        action_kind: ActionKind::Validate,
        auto_fixable: false,
    },
];

/// Error memory backed by the `errors` collection plus a JSON audit file.
pub struct ErrorMemory {
    store: Arc<dyn VectorStore>,
    events: RwLock<Vec<ErrorEvent>>,
    audit_path: Option<PathBuf>,
}

impl ErrorMemory {
    /// Ephemeral error memory (tests, one-shot sessions).
    pub fn in_memory(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            events: RwLock::new(Vec::new()),
            audit_path: None,
        }
    }

    /// Error memory with the audit mirror at `<workspace>/.errors/error_logs.json`.
    pub fn persistent(store: Arc<dyn VectorStore>, working_directory: &Path) -> Self {
        let path = working_directory.join(".errors").join("error_logs.json");
        let events = Self::load_audit(&path);
        debug!(count = events.len(), path = %path.display(), "Error memory loaded");
        Self {
            store,
            events: RwLock::new(events),
            audit_path: Some(path),
        }
    }

    fn load_audit(path: &PathBuf) -> Vec<ErrorEvent> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(events) => events,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt error log, starting empty");
                Vec::new()
            }
        }
    }

    fn save_audit(&self, events: &[ErrorEvent]) {
        let Some(path) = &self.audit_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "Failed to create error log directory");
                return;
            }
        }
        match serde_json::to_string_pretty(events) {
            Ok(content) => {
                if let Err(e) = std::fs::write(path, content) {
                    warn!(error = %e, "Failed to write error log");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize error log"),
        }
    }

    /// Log a failure. Attaches a remediation when the catalog matches, then
    /// stores the event in both the audit log and the errors collection.
    /// Returns the event id.
    pub async fn log(
        &self,
        tool: &str,
        operation: &str,
        error: &str,
        meta: serde_json::Map<String, Value>,
    ) -> String {
        let mut event = ErrorEvent::new(tool, operation, error).with_meta(meta);
        event.remediation = self.remediate(&event);
        let id = event.id.clone();

        if let Err(e) = self
            .store
            .upsert(&event.id, &event.to_document(), event.to_metadata())
            .await
        {
            warn!(error = %e, "Failed to store error event in collection");
        }

        let mut events = self.events.write().await;
        events.push(event);
        self.save_audit(&events);
        debug!(event_id = %id, tool, operation, "Error logged");
        id
    }

    /// Match an event against the catalog. First match wins; a per-tool
    /// generic fallback guarantees every error yields some suggestion.
    pub fn remediate(&self, event: &ErrorEvent) -> Option<Remediation> {
        let error_lower = event.error.to_lowercase();

        for pattern in CATALOG {
            if !pattern.keywords.iter().all(|k| error_lower.contains(k)) {
                continue;
            }
            if let Some(tool) = pattern.tool {
                if tool != event.tool {
                    continue;
                }
            }
            if let Some(operation) = pattern.operation {
                if operation != event.operation {
                    continue;
                }
            }
            return Some(Remediation {
                suggestion: substitute_placeholders(pattern.suggestion, &event.meta),
                severity: pattern.severity,
                action_kind: pattern.action_kind,
                auto_fixable: pattern.auto_fixable,
            });
        }

        Some(generic_remediation(&event.tool, &event.operation))
    }

    /// Pre-flight advice before executing a tool call, based on similar
    /// past errors and exact metadata matches on the target path.
    pub async fn preflight(&self, tool: &str, operation: &str, args: &Value) -> Preflight {
        let query = format!("{tool} {operation}");
        let hits = match self.store.query(&query, 10).await {
            Ok(hits) => hits,
            Err(_) => return Preflight::default(),
        };
        if hits.is_empty() {
            return Preflight::default();
        }

        let target_path = args.get("path").and_then(|v| v.as_str());
        let mut warnings = Vec::new();
        let mut validations = Vec::new();

        for hit in &hits {
            let error = hit
                .metadata
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            if let (Some(target), Some(failed)) =
                (target_path, hit.metadata.get("path").and_then(|v| v.as_str()))
            {
                if target == failed {
                    warnings.push(format!("Path '{failed}' has failed before: {error}"));
                }
            }

            let error_lower = error.to_lowercase();
            if error_lower.contains("not exist") || error_lower.contains("no such file") {
                validations.push("check_exists_before_operation".to_string());
            }
            if error_lower.contains("permission") {
                validations.push("check_permissions".to_string());
            }
            if error_lower.contains("too large") || error_lower.contains("size") {
                validations.push("check_file_size".to_string());
            }
        }

        validations.sort();
        validations.dedup();

        Preflight {
            warnings,
            recommended_validations: validations,
            confidence: (hits.len() as f32 / 10.0).min(1.0),
        }
    }

    /// Aggregate error patterns, optionally scoped to a time window and tool.
    pub async fn analyze(&self, window_days: Option<i64>, tool: Option<&str>) -> PatternReport {
        let events = self.events.read().await;

        let cutoff = window_days.map(|d| chrono::Utc::now() - chrono::Duration::days(d));
        let filtered: Vec<&ErrorEvent> = events
            .iter()
            .filter(|e| tool.is_none_or(|t| e.tool == t))
            .filter(|e| cutoff.is_none_or(|c| e.ts >= c))
            .collect();

        if filtered.is_empty() {
            return PatternReport::default();
        }

        let mut by_tool: HashMap<String, usize> = HashMap::new();
        let mut by_operation: HashMap<String, usize> = HashMap::new();
        let mut by_error: HashMap<String, usize> = HashMap::new();
        let mut by_extension: HashMap<String, usize> = HashMap::new();
        let mut by_path: HashMap<String, Vec<String>> = HashMap::new();

        for event in &filtered {
            *by_tool.entry(event.tool.clone()).or_default() += 1;
            *by_operation.entry(event.operation.clone()).or_default() += 1;
            let error_key: String = event.error.chars().take(100).collect();
            *by_error.entry(error_key).or_default() += 1;

            if let Some(path) = event.meta.get("path").and_then(|v| v.as_str()) {
                by_path
                    .entry(path.to_string())
                    .or_default()
                    .push(event.error.clone());
                if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
                    *by_extension.entry(format!(".{ext}")).or_default() += 1;
                }
            }
        }

        let mut problematic_paths: Vec<PathIssue> = by_path
            .into_iter()
            .map(|(path, errors)| PathIssue {
                path,
                error_count: errors.len(),
                samples: errors.into_iter().take(3).collect(),
            })
            .collect();
        problematic_paths.sort_by(|a, b| b.error_count.cmp(&a.error_count));
        problematic_paths.truncate(5);

        let by_tool = sorted_counts(by_tool, usize::MAX);
        let by_operation = sorted_counts(by_operation, 10);
        let top_error_types = sorted_counts(by_error, 10);
        let by_extension = sorted_counts(by_extension, 10);

        let recommendations = build_recommendations(
            &by_tool,
            &by_operation,
            &top_error_types,
            &by_extension,
            &problematic_paths,
        );

        PatternReport {
            total: filtered.len(),
            by_tool,
            by_operation,
            top_error_types,
            by_extension,
            problematic_paths,
            recommendations,
        }
    }

    /// Human-readable summary for the admin surface.
    pub async fn summary(&self) -> String {
        let events = self.events.read().await;
        if events.is_empty() {
            return "No errors logged yet.".into();
        }

        let day_ago = chrono::Utc::now() - chrono::Duration::days(1);
        let recent = events.iter().filter(|e| e.ts >= day_ago).count();

        let mut by_tool: HashMap<&str, usize> = HashMap::new();
        for e in events.iter() {
            *by_tool.entry(e.tool.as_str()).or_default() += 1;
        }
        let worst = by_tool
            .iter()
            .max_by_key(|(_, c)| **c)
            .map(|(t, c)| format!("{t} ({c} errors)"))
            .unwrap_or_else(|| "n/a".into());

        format!(
            "Errors logged: {} total, {} in the last 24h. Most problematic tool: {}.",
            events.len(),
            recent,
            worst
        )
    }
}

fn sorted_counts(map: HashMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut v: Vec<(String, usize)> = map.into_iter().collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    v.truncate(limit);
    v
}

/// Substitute `{path}`, `{extension}`, `{file_size}`, `{max_size}` from
/// event metadata. Sizes are given in bytes and rendered in MB.
fn substitute_placeholders(template: &str, meta: &serde_json::Map<String, Value>) -> String {
    let mut out = template.to_string();

    if out.contains("{path}") {
        if let Some(path) = meta.get("path").and_then(|v| v.as_str()) {
            out = out.replace("{path}", path);
        }
    }
    if out.contains("{extension}") {
        if let Some(ext) = meta.get("extension").and_then(|v| v.as_str()) {
            out = out.replace("{extension}", ext);
        }
    }
    if out.contains("{file_size}") {
        if let Some(bytes) = meta.get("file_size").and_then(|v| v.as_u64()) {
            out = out.replace(
                "{file_size}",
                &format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0)),
            );
        }
    }
    if out.contains("{max_size}") {
        if let Some(bytes) = meta.get("max_size").and_then(|v| v.as_u64()) {
            out = out.replace(
                "{max_size}",
                &format!("{:.0}MB", bytes as f64 / (1024.0 * 1024.0)),
            );
        }
    }
    out
}

/// Per-tool generic fallback so every error yields some suggestion.
fn generic_remediation(tool: &str, operation: &str) -> Remediation {
    let suggestion = match (tool, operation) {
        ("filesystem", "read") => "Verify the file exists and is readable before reading",
        ("filesystem", "write") => "Ensure the directory exists and is writable",
        ("filesystem", "delete") => "Check that the file or directory exists before deleting",
        ("filesystem", "list") => "Verify the path is a valid directory",
        ("filesystem", _) => "Verify the path and operation are valid",
        ("shell", _) => "Verify the command syntax and that required tools are installed",
        ("web_search", _) => "Check the internet connection and the search query format",
        _ => "Review the tool arguments and retry with corrected input",
    };
    Remediation {
        suggestion: suggestion.into(),
        severity: Severity::Low,
        action_kind: ActionKind::Validate,
        auto_fixable: false,
    }
}

fn build_recommendations(
    by_tool: &[(String, usize)],
    by_operation: &[(String, usize)],
    top_error_types: &[(String, usize)],
    by_extension: &[(String, usize)],
    problematic_paths: &[PathIssue],
) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if let Some((tool, count)) = by_tool.first() {
        if *count > 10 {
            recs.push(Recommendation {
                severity: Severity::High,
                category: "tool_reliability".into(),
                message: format!("Tool '{tool}' has {count} errors"),
                action: format!("Review {tool} usage and add better input validation"),
            });
        }
    }

    if let Some((operation, count)) = by_operation.first() {
        if *count > 5 {
            recs.push(Recommendation {
                severity: Severity::Medium,
                category: "operation_failure".into(),
                message: format!("Operation '{operation}' fails frequently ({count} times)"),
                action: format!("Add validation before '{operation}' operations"),
            });
        }
    }

    for (ext, count) in by_extension.iter().take(3) {
        if *count > 3 {
            recs.push(Recommendation {
                severity: Severity::Low,
                category: "file_type".into(),
                message: format!("Files with extension '{ext}' cause {count} errors"),
                action: format!("Add special handling for {ext} files or block them"),
            });
        }
    }

    for issue in problematic_paths.iter().take(3) {
        if issue.error_count > 3 {
            recs.push(Recommendation {
                severity: Severity::Medium,
                category: "path_issue".into(),
                message: format!("Path '{}' causes {} errors", issue.path, issue.error_count),
                action: format!(
                    "Investigate path '{}' for permission or access issues",
                    issue.path
                ),
            });
        }
    }

    for (error, count) in top_error_types.iter().take(3) {
        if *count > 5 {
            let error_lower = error.to_lowercase();
            if error_lower.contains("not exist") {
                recs.push(Recommendation {
                    severity: Severity::Medium,
                    category: "validation".into(),
                    message: format!("'{}' occurs {count} times", truncate(error, 50)),
                    action: "Add existence checks before operations".into(),
                });
            } else if error_lower.contains("permission") {
                recs.push(Recommendation {
                    severity: Severity::High,
                    category: "security".into(),
                    message: format!("Permission errors occur {count} times"),
                    action: "Review file permissions and sandbox settings".into(),
                });
            }
        }
    }

    recs
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use serde_json::{json, Map};

    fn error_memory() -> ErrorMemory {
        ErrorMemory::in_memory(Arc::new(InMemoryStore::new()))
    }

    fn meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn log_stores_in_collection_and_attaches_remediation() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let em = ErrorMemory::in_memory(store.clone());

        let id = em
            .log(
                "filesystem",
                "read",
                "File 'notes.txt' does not exist",
                meta(&[("path", json!("notes.txt"))]),
            )
            .await;
        assert!(id.starts_with("err_"));
        assert_eq!(store.count().await.unwrap(), 1);

        let report = em.analyze(None, None).await;
        assert_eq!(report.total, 1);
        assert_eq!(report.by_tool[0], ("filesystem".to_string(), 1));
    }

    #[test]
    fn remediation_substitutes_path() {
        let em = error_memory();
        let event = ErrorEvent::new("filesystem", "read", "File does not exist")
            .with_meta(meta(&[("path", json!("data/notes.txt"))]));

        let r = em.remediate(&event).unwrap();
        assert!(r.suggestion.contains("data/notes.txt"));
        assert_eq!(r.severity, Severity::Medium);
        assert_eq!(r.action_kind, ActionKind::Create);
        assert!(r.auto_fixable);
    }

    #[test]
    fn remediation_substitutes_sizes_in_mb() {
        let em = error_memory();
        let event = ErrorEvent::new("filesystem", "write", "File is too large").with_meta(meta(&[
            ("file_size", json!(15_728_640u64)), // 15 MB
            ("max_size", json!(10_485_760u64)),  // 10 MB
        ]));

        let r = em.remediate(&event).unwrap();
        assert!(r.suggestion.contains("15.0MB"), "{}", r.suggestion);
        assert!(r.suggestion.contains("10MB"), "{}", r.suggestion);
        assert_eq!(r.action_kind, ActionKind::Config);
    }

    #[test]
    fn remediation_respects_tool_filter() {
        let em = error_memory();
        // "command not found" is a shell pattern; for filesystem it must
        // not match and falls through to the generic fallback.
        let event = ErrorEvent::new("filesystem", "read", "command not found somehow");
        let r = em.remediate(&event).unwrap();
        assert_eq!(r.action_kind, ActionKind::Validate);

        let event = ErrorEvent::new("shell", "execute", "sh: foo: command not found");
        let r = em.remediate(&event).unwrap();
        assert_eq!(r.action_kind, ActionKind::Install);
    }

    #[test]
    fn every_error_gets_a_suggestion() {
        let em = error_memory();
        let event = ErrorEvent::new("unknown_tool", "whatever", "some novel failure mode");
        let r = em.remediate(&event).unwrap();
        assert!(!r.suggestion.is_empty());
        assert_eq!(r.severity, Severity::Low);
    }

    #[test]
    fn catalog_covers_known_patterns() {
        let em = error_memory();
        let cases: &[(&str, &str, &str, ActionKind)] = &[
            ("filesystem", "read", "file 'x' does not exist", ActionKind::Create),
            ("filesystem", "read", "permission denied", ActionKind::Permission),
            ("filesystem", "write", "blocked path: /etc", ActionKind::Config),
            ("filesystem", "read", "path is outside the workspace", ActionKind::Config),
            ("filesystem", "write", "extension .exe not allowed", ActionKind::Config),
            ("filesystem", "list", "path is not a directory", ActionKind::Validate),
            ("filesystem", "read", "path is a directory", ActionKind::Validate),
            ("filesystem", "read", "file appears to be binary", ActionKind::Manual),
            ("shell", "execute", "bash: nmap: command not found", ActionKind::Install),
            ("shell", "execute", "command timed out after 300s", ActionKind::Config),
            ("web_search", "search", "connection refused", ActionKind::Manual),
            ("web_search", "search", "HTTP 404 returned", ActionKind::Validate),
        ];
        for (tool, op, error, expected) in cases {
            let r = em.remediate(&ErrorEvent::new(*tool, *op, *error)).unwrap();
            assert_eq!(r.action_kind, *expected, "error: {error}");
        }
    }

    #[tokio::test]
    async fn preflight_warns_on_known_bad_path() {
        let em = error_memory();
        em.log(
            "filesystem",
            "read",
            "File 'broken.txt' does not exist",
            meta(&[("path", json!("broken.txt"))]),
        )
        .await;

        let pf = em
            .preflight("filesystem", "read", &json!({"path": "broken.txt"}))
            .await;
        assert!(!pf.warnings.is_empty());
        assert!(pf
            .recommended_validations
            .contains(&"check_exists_before_operation".to_string()));
        assert!(pf.confidence > 0.0);
    }

    #[tokio::test]
    async fn preflight_empty_without_history() {
        let em = error_memory();
        let pf = em
            .preflight("filesystem", "read", &json!({"path": "fresh.txt"}))
            .await;
        assert!(pf.is_empty());
        assert_eq!(pf.confidence, 0.0);
    }

    #[tokio::test]
    async fn analyze_aggregates_by_tool_and_extension() {
        let em = error_memory();
        for i in 0..3 {
            em.log(
                "filesystem",
                "read",
                "file does not exist",
                meta(&[("path", json!(format!("file{i}.txt")))]),
            )
            .await;
        }
        em.log("shell", "execute", "command not found", Map::new())
            .await;

        let report = em.analyze(None, None).await;
        assert_eq!(report.total, 4);
        assert_eq!(report.by_tool[0], ("filesystem".to_string(), 3));
        assert_eq!(report.by_extension[0], (".txt".to_string(), 3));

        let scoped = em.analyze(None, Some("shell")).await;
        assert_eq!(scoped.total, 1);
    }

    #[tokio::test]
    async fn audit_file_persists_events() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());

        let em = ErrorMemory::persistent(store.clone(), tmp.path());
        em.log("shell", "execute", "boom", Map::new()).await;

        let audit = tmp.path().join(".errors/error_logs.json");
        assert!(audit.exists());

        // Reload picks up the logged event
        let em2 = ErrorMemory::persistent(store, tmp.path());
        let report = em2.analyze(None, None).await;
        assert_eq!(report.total, 1);
    }
}
