//! Filesystem sandboxing: workspace scoping, blocked paths, extension and
//! size limits.
//!
//! File tools resolve every path through this policy. Checks, in order:
//! traversal rejection on the raw string, canonicalization, blocked-path
//! prefixes, workspace containment (when sandbox mode is on), allowed
//! extensions, and the file-size cap.
//!
//! Error messages deliberately use the phrasings the remediation catalog
//! keys on ("outside the workspace", "blocked path", "not allowed",
//! "too large").

use std::path::{Path, PathBuf};

use ironmind_core::error::ToolError;

/// Sandbox rules for file access.
pub struct SandboxPolicy {
    sandbox_mode: bool,
    workspace_root: PathBuf,
    blocked_paths: Vec<String>,
    allowed_extensions: Vec<String>,
    max_file_size_bytes: u64,
}

impl SandboxPolicy {
    pub fn new(
        sandbox_mode: bool,
        workspace_root: PathBuf,
        blocked_paths: Vec<String>,
        allowed_extensions: Vec<String>,
        max_file_size_mb: u64,
    ) -> Self {
        Self {
            sandbox_mode,
            workspace_root,
            blocked_paths,
            allowed_extensions,
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
        }
    }

    /// A policy with sandbox mode off and no extension limits. Tests and
    /// trusted sessions only.
    pub fn permissive(workspace_root: PathBuf) -> Self {
        Self {
            sandbox_mode: false,
            workspace_root,
            blocked_paths: vec![],
            allowed_extensions: vec![],
            max_file_size_bytes: 100 * 1024 * 1024,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// Resolve and validate a path for file access.
    ///
    /// Relative paths resolve against the workspace root. Returns the
    /// resolved path on success.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        // Reject traversal attempts on the raw string before touching the fs
        let normalized = path.replace('\\', "/");
        if normalized.contains("../") || normalized.contains("/..") || normalized == ".." {
            return Err(ToolError::SandboxViolation(format!(
                "path traversal detected in '{path}'"
            )));
        }

        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.workspace_root.join(path)
        };

        // Canonicalize to defeat symlinks; for not-yet-existing files,
        // canonicalize the parent and re-attach the file name.
        let canonical = if joined.exists() {
            joined.canonicalize().map_err(|e| {
                ToolError::ExecutionFailed {
                    tool_name: "filesystem".into(),
                    reason: format!("cannot resolve '{path}': {e}"),
                }
            })?
        } else if let Some(parent) = joined.parent() {
            if parent.exists() {
                let canonical_parent =
                    parent
                        .canonicalize()
                        .map_err(|e| ToolError::ExecutionFailed {
                            tool_name: "filesystem".into(),
                            reason: format!("cannot resolve parent of '{path}': {e}"),
                        })?;
                canonical_parent.join(joined.file_name().unwrap_or_default())
            } else {
                joined.clone()
            }
        } else {
            joined.clone()
        };

        let canonical_str = canonical.to_string_lossy().replace('\\', "/").to_lowercase();

        for blocked in &self.blocked_paths {
            let blocked_normalized = expand_tilde(blocked).replace('\\', "/").to_lowercase();
            if canonical_str.starts_with(&blocked_normalized) {
                return Err(ToolError::SandboxViolation(format!(
                    "blocked path: '{path}' falls under '{blocked}'"
                )));
            }
        }

        if self.sandbox_mode && !self.path_within_workspace(&canonical) {
            return Err(ToolError::SandboxViolation(format!(
                "path '{path}' is outside the workspace"
            )));
        }

        Ok(canonical)
    }

    /// Whether a resolved path sits inside the workspace root.
    pub fn path_within_workspace(&self, path: &Path) -> bool {
        let root = self
            .workspace_root
            .canonicalize()
            .unwrap_or_else(|_| self.workspace_root.clone());
        let root_str = root.to_string_lossy().replace('\\', "/").to_lowercase();
        let path_str = path.to_string_lossy().replace('\\', "/").to_lowercase();
        path_str.starts_with(&root_str)
    }

    /// Check the extension against the allowed list. Directories and an
    /// empty allowed list are exempt.
    pub fn check_extension(&self, path: &Path) -> Result<(), ToolError> {
        if self.allowed_extensions.is_empty() {
            return Ok(());
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(());
        };
        let dotted = format!(".{}", ext.to_lowercase());
        if !self.allowed_extensions.iter().any(|a| a.to_lowercase() == dotted) {
            return Err(ToolError::SandboxViolation(format!(
                "extension {dotted} not allowed"
            )));
        }
        Ok(())
    }

    /// Check a byte count against the size cap.
    pub fn check_size(&self, bytes: u64) -> Result<(), ToolError> {
        if bytes > self.max_file_size_bytes {
            return Err(ToolError::SandboxViolation(format!(
                "file is too large: {bytes} bytes exceeds the limit"
            )));
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") || path == "~" {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
