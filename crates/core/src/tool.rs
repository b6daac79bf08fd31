//! Tool trait and registry, the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: read and
//! write files, execute shell commands, search the web, generate code.
//! Every tool carries a danger class consumed by the confirmation policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// How dangerous a tool is, consumed by the confirmation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerClass {
    /// Pure reads and queries, no side effects
    Safe,
    /// Mutates the filesystem or other local state
    Mutating,
    /// Arbitrary command execution or elevated access
    Privileged,
}

/// A request to execute a tool, as returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the provider's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// Outcome class of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
    Blocked,
    Timeout,
}

/// The result of a tool execution.
///
/// `output` is the only field surfaced to the LLM (truncated and
/// status-prefixed by the mediation layer); `metadata` feeds error memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            output: Some(output.into()),
            error: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            output: None,
            error: Some(message.into()),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Blocked,
            output: None,
            error: Some(message.into()),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Timeout,
            output: None,
            error: Some(message.into()),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a scalar metadata value. Non-scalar values are the caller's
    /// mistake and are stored as their JSON rendering.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// The core Tool trait.
///
/// Each tool (filesystem, shell, web_search, code_generator, web_generator)
/// implements this trait. Tools are registered in the ToolRegistry and made
/// available to the reasoning loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "filesystem").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// The danger class of this tool, consumed by the confirmation policy.
    fn danger_class(&self) -> DangerClass;

    /// Validate arguments against this tool's contract before execution.
    ///
    /// The default checks that arguments form a JSON object and that every
    /// `required` field of the schema is present.
    fn validate(&self, arguments: &serde_json::Value) -> std::result::Result<(), ToolError> {
        let obj = arguments
            .as_object()
            .ok_or_else(|| ToolError::InvalidArguments("arguments must be a JSON object".into()))?;

        let schema = self.parameters_schema();
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for field in required {
                if let Some(name) = field.as_str() {
                    if !obj.contains_key(name) {
                        return Err(ToolError::InvalidArguments(format!(
                            "missing required argument '{name}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The reasoning loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Validate and execute a tool call without mediation.
    ///
    /// The mediation layer (sandbox, timeout, error logging, truncation)
    /// wraps this. Unknown tools and invalid arguments come back as error
    /// results, not panics.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.validate(&call.arguments)?;
        tool.execute(call.arguments.clone()).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
