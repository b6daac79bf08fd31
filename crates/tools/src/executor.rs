//! Tool mediation: the single path every tool call takes.
//!
//! Wraps the raw registry with the safety envelope:
//! 1. unknown tools and invalid arguments become error results
//! 2. sandbox and permission failures become blocked results
//! 3. execution runs under a hard timeout
//! 4. every non-success outcome is logged to error memory with rich
//!    metadata before it surfaces to the LLM
//!
//! Observations sent back to the LLM are status-prefixed and truncated.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use ironmind_core::error::ToolError;
use ironmind_core::tool::{ToolCall, ToolRegistry, ToolResult, ToolStatus};
use ironmind_memory::ErrorMemory;

/// Mediated tool execution.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    error_memory: Arc<ErrorMemory>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, error_memory: Arc<ErrorMemory>, timeout: Duration) -> Self {
        Self {
            registry,
            error_memory,
            timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one tool call through the full mediation pipeline.
    /// Never returns an error: every failure mode folds into a result so
    /// the reasoning loop can surface it as an observation.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let operation = call.arguments["operation"]
            .as_str()
            .unwrap_or("execute")
            .to_string();

        let result = match tokio::time::timeout(self.timeout, self.registry.execute(call)).await {
            Ok(Ok(result)) => result,
            Ok(Err(tool_error)) => Self::error_to_result(&call.name, tool_error),
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = self.timeout.as_secs(), "Tool call timed out");
                ToolResult::timeout(format!(
                    "tool '{}' timed out after {}s",
                    call.name,
                    self.timeout.as_secs()
                ))
            }
        };

        if result.status != ToolStatus::Success {
            let error_text = result
                .error
                .clone()
                .unwrap_or_else(|| "unknown failure".into());
            let mut meta = result.metadata.clone();
            // Carry the call target into error metadata for pattern analysis
            if let Some(path) = call.arguments.get("path").and_then(|v| v.as_str()) {
                meta.entry("path".to_string())
                    .or_insert_with(|| path.into());
                if let Some(ext) = std::path::Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                {
                    meta.entry("extension".to_string())
                        .or_insert_with(|| format!(".{ext}").into());
                }
            }
            self.error_memory
                .log(&call.name, &operation, &error_text, meta)
                .await;
        } else {
            debug!(tool = %call.name, operation = %operation, "Tool call succeeded");
        }

        result
    }

    fn error_to_result(tool_name: &str, error: ToolError) -> ToolResult {
        match &error {
            ToolError::NotFound(name) => ToolResult::error(format!("unknown tool: {name}")),
            ToolError::InvalidArguments(_) | ToolError::ExecutionFailed { .. } => {
                ToolResult::error(error.to_string())
            }
            ToolError::PermissionDenied { .. } | ToolError::SandboxViolation(_) => {
                ToolResult::blocked(error.to_string())
            }
            ToolError::Timeout { .. } => ToolResult::timeout(error.to_string()),
        }
        .with_meta("tool", tool_name)
    }

    /// Render a result as the observation string sent to the LLM:
    /// status prefix plus output truncated to `limit` characters.
    pub fn render_observation(result: &ToolResult, limit: usize) -> String {
        let (prefix, body) = match result.status {
            ToolStatus::Success => ("Success", result.output.as_deref().unwrap_or("")),
            ToolStatus::Error => ("Error", result.error.as_deref().unwrap_or("unknown error")),
            ToolStatus::Blocked => ("Blocked", result.error.as_deref().unwrap_or("blocked")),
            ToolStatus::Timeout => ("Timeout", result.error.as_deref().unwrap_or("timed out")),
        };

        let truncated = if body.chars().count() > limit {
            let kept: String = body.chars().take(limit).collect();
            let dropped = body.chars().count() - limit;
            format!("{kept}\n[... truncated {dropped} chars]")
        } else {
            body.to_string()
        };

        format!("{prefix}: {truncated}")
    }
}
