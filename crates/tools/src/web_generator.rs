//! Web generator tool: writes a complete HTML page into the workspace.
//!
//! Like the code generator, the LLM supplies the markup; the tool owns
//! path validation and persistence so generated pages stay sandboxed.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ironmind_core::error::ToolError;
use ironmind_core::schema::ObjectSchema;
use ironmind_core::tool::{DangerClass, Tool, ToolResult};

use crate::sandbox::SandboxPolicy;

pub struct WebGeneratorTool {
    sandbox: Arc<SandboxPolicy>,
}

impl WebGeneratorTool {
    pub fn new(sandbox: Arc<SandboxPolicy>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WebGeneratorTool {
    fn name(&self) -> &str {
        "web_generator"
    }

    fn description(&self) -> &str {
        "Write a generated HTML page into the workspace. Provide the complete markup in 'html'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        ObjectSchema::new()
            .string("filename", "Target file name ending in .html, relative to the workspace")
            .string("html", "Complete HTML document to write")
            .string("title", "Page title (informational)")
            .required(&["filename", "html"])
            .build()
    }

    fn danger_class(&self) -> DangerClass {
        DangerClass::Mutating
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let filename = arguments["filename"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'filename'".into()))?;
        let html = arguments["html"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'html'".into()))?;

        if !filename.ends_with(".html") && !filename.ends_with(".htm") {
            return Err(ToolError::InvalidArguments(
                "filename must end in .html or .htm".into(),
            ));
        }

        let path = self.sandbox.resolve(filename)?;
        self.sandbox.check_size(html.len() as u64)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "web_generator".into(),
                    reason: format!("failed to create parent directory: {e}"),
                })?;
        }

        tokio::fs::write(&path, html)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_generator".into(),
                reason: format!("failed to write '{}': {e}", path.display()),
            })?;

        debug!(path = %path.display(), bytes = html.len(), "Web page generated");

        Ok(ToolResult::success(format!(
            "Generated {} ({} bytes)",
            path.display(),
            html.len()
        ))
        .with_meta("path", path.display().to_string()))
    }
}
