//! Per-turn context audit log.
//!
//! Appends one record per tool turn to `.context/context_log.json`: the
//! user command, the tool action taken, the (truncated) result, the
//! status, and a timestamp. Purely observational; failures to write are
//! logged and ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub user_command: String,
    pub tool_action: String,
    pub result: String,
    pub status: String,
    pub ts: DateTime<Utc>,
}

/// Append-only audit log of tool turns.
pub struct ContextAudit {
    path: Option<PathBuf>,
}

impl ContextAudit {
    /// Audit log at `<workspace>/.context/context_log.json`.
    pub fn persistent(working_directory: &Path) -> Self {
        Self {
            path: Some(working_directory.join(".context").join("context_log.json")),
        }
    }

    /// Disabled audit (tests, ephemeral sessions).
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Append one record. Result text is truncated to keep the log light.
    pub fn record(&self, user_command: &str, tool_action: &str, result: &str, status: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let mut records = Self::load(path);
        records.push(ContextRecord {
            user_command: user_command.to_string(),
            tool_action: tool_action.to_string(),
            result: result.chars().take(200).collect(),
            status: status.to_string(),
            ts: Utc::now(),
        });

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "Failed to create context log directory");
                return;
            }
        }
        match serde_json::to_string_pretty(&records) {
            Ok(content) => {
                if let Err(e) = std::fs::write(path, content) {
                    warn!(error = %e, "Failed to write context log");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize context log"),
        }
    }

    fn load(path: &PathBuf) -> Vec<ContextRecord> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or_default()
    }
}
