//! Code generator tool: writes source files into the workspace.
//!
//! The LLM produces the code in the tool arguments; this tool validates the
//! target path and persists the file. Keeping the write behind a tool keeps
//! generated code inside the sandbox and under the confirmation policy.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ironmind_core::error::ToolError;
use ironmind_core::schema::ObjectSchema;
use ironmind_core::tool::{DangerClass, Tool, ToolResult};

use crate::sandbox::SandboxPolicy;

pub struct CodeGeneratorTool {
    sandbox: Arc<SandboxPolicy>,
}

impl CodeGeneratorTool {
    pub fn new(sandbox: Arc<SandboxPolicy>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for CodeGeneratorTool {
    fn name(&self) -> &str {
        "code_generator"
    }

    fn description(&self) -> &str {
        "Write a generated source code file into the workspace. Provide the complete file content in 'code'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        ObjectSchema::new()
            .string("filename", "Target file name, relative to the workspace")
            .string("code", "Complete file content to write")
            .string("language", "Programming language of the code (informational)")
            .required(&["filename", "code"])
            .build()
    }

    fn danger_class(&self) -> DangerClass {
        DangerClass::Mutating
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let filename = arguments["filename"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'filename'".into()))?;
        let code = arguments["code"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'code'".into()))?;
        let language = arguments["language"].as_str().unwrap_or("unknown");

        let path = self.sandbox.resolve(filename)?;
        self.sandbox.check_extension(&path)?;
        self.sandbox.check_size(code.len() as u64)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "code_generator".into(),
                    reason: format!("failed to create parent directory: {e}"),
                })?;
        }

        tokio::fs::write(&path, code)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "code_generator".into(),
                reason: format!("failed to write '{}': {e}", path.display()),
            })?;

        debug!(path = %path.display(), language, bytes = code.len(), "Code file generated");

        Ok(ToolResult::success(format!(
            "Generated {} ({} bytes, {})",
            path.display(),
            code.len(),
            language
        ))
        .with_meta("path", path.display().to_string())
        .with_meta("language", language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (tempfile::TempDir, CodeGeneratorTool) {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(SandboxPolicy::new(
            true,
            tmp.path().to_path_buf(),
            vec![],
            vec![".py".into(), ".rs".into()],
            10,
        ));
        (tmp, CodeGeneratorTool::new(sandbox))
    }

    #[tokio::test]
    async fn writes_code_file() {
        let (tmp, tool) = tool();
        let result = tool
            .execute(serde_json::json!({
                "filename": "kal.py",
                "code": "print(1 + 2)\n",
                "language": "python",
            }))
            .await
            .unwrap();
        assert!(result.is_success());

        let written = std::fs::read_to_string(tmp.path().join("kal.py")).unwrap();
        assert_eq!(written, "print(1 + 2)\n");
    }

    #[tokio::test]
    async fn rejects_disallowed_extension() {
        let (_tmp, tool) = tool();
        let err = tool
            .execute(serde_json::json!({"filename": "x.exe", "code": "MZ"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[tokio::test]
    async fn rejects_escape_from_workspace() {
        let (_tmp, tool) = tool();
        let err = tool
            .execute(serde_json::json!({"filename": "../escape.py", "code": "pass"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }
}
