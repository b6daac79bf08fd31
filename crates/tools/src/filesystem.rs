//! Filesystem tool: read, write, append, delete, list, exists, mkdir, search.
//!
//! Every path goes through the sandbox policy. Read-class operations (read,
//! list, exists, search) are safe; the confirmation policy still asks when
//! their target resolves outside the workspace.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use ironmind_core::error::ToolError;
use ironmind_core::schema::ObjectSchema;
use ironmind_core::tool::{DangerClass, Tool, ToolResult};

use crate::sandbox::SandboxPolicy;

/// Operations with no side effects. Used by the confirmation policy to
/// refine the danger class per call.
pub const READ_OPERATIONS: &[&str] = &["read", "list", "exists", "search"];

pub struct FilesystemTool {
    sandbox: Arc<SandboxPolicy>,
}

impl FilesystemTool {
    pub fn new(sandbox: Arc<SandboxPolicy>) -> Self {
        Self { sandbox }
    }

    async fn read(&self, path: &Path) -> Result<ToolResult, ToolError> {
        if path.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("'{}' is a directory, not a file", path.display()),
            });
        }
        let meta = tokio::fs::metadata(path).await.map_err(|_| {
            ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("file '{}' does not exist", path.display()),
            }
        })?;
        self.sandbox.check_size(meta.len())?;

        let bytes = tokio::fs::read(path).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "filesystem".into(),
            reason: format!("failed to read '{}': {e}", path.display()),
        })?;

        match String::from_utf8(bytes) {
            Ok(content) => Ok(ToolResult::success(content)
                .with_meta("path", path.display().to_string())
                .with_meta("size", meta.len())),
            Err(_) => Err(ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("file '{}' appears to be binary, not text", path.display()),
            }),
        }
    }

    async fn write(&self, path: &Path, content: &str, append: bool) -> Result<ToolResult, ToolError> {
        self.sandbox.check_extension(path)?;
        self.sandbox.check_size(content.len() as u64)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "filesystem".into(),
                    reason: format!("failed to create parent directory: {e}"),
                })?;
        }

        let result = if append {
            let mut existing = tokio::fs::read_to_string(path).await.unwrap_or_default();
            existing.push_str(content);
            tokio::fs::write(path, existing).await
        } else {
            tokio::fs::write(path, content).await
        };
        result.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "filesystem".into(),
            reason: format!("failed to write '{}': {e}", path.display()),
        })?;

        debug!(path = %path.display(), bytes = content.len(), append, "File written");
        Ok(ToolResult::success(format!(
            "{} {} bytes to {}",
            if append { "Appended" } else { "Wrote" },
            content.len(),
            path.display()
        ))
        .with_meta("path", path.display().to_string()))
    }

    async fn delete(&self, path: &Path) -> Result<ToolResult, ToolError> {
        if !path.exists() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("file '{}' does not exist", path.display()),
            });
        }
        let result = if path.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        result.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "filesystem".into(),
            reason: format!("failed to delete '{}': {e}", path.display()),
        })?;
        Ok(ToolResult::success(format!("Deleted {}", path.display()))
            .with_meta("path", path.display().to_string()))
    }

    async fn list(&self, path: &Path) -> Result<ToolResult, ToolError> {
        if !path.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("'{}' is not a directory", path.display()),
            });
        }
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("failed to list '{}': {e}", path.display()),
            })?;

        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let kind = if entry.path().is_dir() { "dir" } else { "file" };
            names.push(format!("{kind}  {}", entry.file_name().to_string_lossy()));
        }
        names.sort();
        Ok(ToolResult::success(names.join("\n"))
            .with_meta("path", path.display().to_string())
            .with_meta("count", names.len() as u64))
    }

    async fn exists(&self, path: &Path) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::success(if path.exists() {
            format!("'{}' exists", path.display())
        } else {
            format!("'{}' does not exist", path.display())
        }))
    }

    async fn mkdir(&self, path: &Path) -> Result<ToolResult, ToolError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("failed to create directory '{}': {e}", path.display()),
            })?;
        Ok(ToolResult::success(format!("Created directory {}", path.display()))
            .with_meta("path", path.display().to_string()))
    }

    /// Recursive filename search by case-insensitive substring.
    async fn search(&self, path: &Path, pattern: &str) -> Result<ToolResult, ToolError> {
        if !path.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: format!("'{}' is not a directory", path.display()),
            });
        }
        let needle = pattern.to_lowercase();
        let mut matches = Vec::new();
        let mut stack = vec![path.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let entry_path = entry.path();
                let name = entry.file_name().to_string_lossy().to_lowercase();
                if name.contains(&needle) {
                    matches.push(entry_path.display().to_string());
                }
                if entry_path.is_dir() {
                    stack.push(entry_path);
                }
            }
        }
        matches.sort();

        Ok(ToolResult::success(if matches.is_empty() {
            format!("No files matching '{pattern}'")
        } else {
            matches.join("\n")
        })
        .with_meta("count", matches.len() as u64))
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn description(&self) -> &str {
        "File operations inside the workspace: read, write, append, delete, list, exists, mkdir, and filename search."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        ObjectSchema::new()
            .string_enum(
                "operation",
                "The file operation to perform",
                &["read", "write", "append", "delete", "list", "exists", "mkdir", "search"],
            )
            .string("path", "Target path, relative to the workspace")
            .string("content", "Content for write and append operations")
            .string("pattern", "Filename substring for the search operation")
            .required(&["operation", "path"])
            .build()
    }

    fn danger_class(&self) -> DangerClass {
        DangerClass::Mutating
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let operation = arguments["operation"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'operation'".into()))?;
        let raw_path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'path'".into()))?;

        let path = self.sandbox.resolve(raw_path)?;

        let result = match operation {
            "read" => self.read(&path).await,
            "write" | "append" => {
                let content = arguments["content"].as_str().ok_or_else(|| {
                    ToolError::InvalidArguments("'content' is required for write/append".into())
                })?;
                self.write(&path, content, operation == "append").await
            }
            "delete" => self.delete(&path).await,
            "list" => self.list(&path).await,
            "exists" => self.exists(&path).await,
            "mkdir" => self.mkdir(&path).await,
            "search" => {
                let pattern = arguments["pattern"].as_str().ok_or_else(|| {
                    ToolError::InvalidArguments("'pattern' is required for search".into())
                })?;
                self.search(&path, pattern).await
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown operation '{other}'"
            ))),
        };

        // Attach the extension for error-memory pattern analysis
        result.map(|r| {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                r.with_meta("extension", format!(".{ext}"))
            } else {
                r
            }
        })
    }
}
