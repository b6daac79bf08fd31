//! Shell tool: execute system commands under a whitelist and sudo policy.
//!
//! Safety layers, in order:
//! 1. The dangerous-command blocklist is checked first and is
//!    unconditional; sudo does not bypass it.
//! 2. `sudo` invocations require superuser mode and, when enabled, the
//!    stripped command must appear in the sudo whitelist.
//! 3. Plain commands must have their base command in the whitelist
//!    (an empty whitelist allows everything; the default config supplies
//!    a curated list).

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use ironmind_core::error::ToolError;
use ironmind_core::schema::ObjectSchema;
use ironmind_core::tool::{DangerClass, Tool, ToolResult};

/// Command execution rules.
#[derive(Debug, Clone, Default)]
pub struct ShellPolicy {
    /// Allowed base commands. Empty = allow all.
    pub whitelist: Vec<String>,
    /// Whether sudo is permitted at all.
    pub superuser_mode: bool,
    /// Base commands allowed under sudo when superuser mode is on.
    pub sudo_whitelist: Vec<String>,
    /// Command fragments that are always blocked, sudo or not.
    pub dangerous_blocklist: Vec<String>,
}

impl ShellPolicy {
    /// Check a command line against the policy.
    pub fn check(&self, command: &str) -> Result<(), ToolError> {
        let trimmed = command.trim();

        for dangerous in &self.dangerous_blocklist {
            if trimmed.contains(dangerous.as_str()) {
                return Err(ToolError::PermissionDenied {
                    tool_name: "shell".into(),
                    reason: format!("command matches dangerous blocklist entry '{dangerous}'"),
                });
            }
        }

        if let Some(rest) = trimmed.strip_prefix("sudo ").or(if trimmed == "sudo" {
            Some("")
        } else {
            None
        }) {
            if !self.superuser_mode {
                return Err(ToolError::PermissionDenied {
                    tool_name: "shell".into(),
                    reason: "sudo is disabled (superuser_mode is off)".into(),
                });
            }
            let base = rest.split_whitespace().next().unwrap_or("");
            if !self.sudo_whitelist.iter().any(|a| a == base) {
                return Err(ToolError::PermissionDenied {
                    tool_name: "shell".into(),
                    reason: format!("'{base}' is not in the sudo whitelist"),
                });
            }
            return Ok(());
        }

        if self.whitelist.is_empty() {
            return Ok(());
        }
        let base = trimmed.split_whitespace().next().unwrap_or("");
        if !self.whitelist.iter().any(|a| a == base) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!("command '{base}' not in whitelist"),
            });
        }
        Ok(())
    }

    /// Whether a command line invokes sudo. The confirmation policy uses
    /// this to force an ask regardless of mode.
    pub fn is_sudo(command: &str) -> bool {
        let trimmed = command.trim();
        trimmed == "sudo" || trimmed.starts_with("sudo ")
    }
}

/// Execute shell commands under the policy.
pub struct ShellTool {
    policy: ShellPolicy,
}

impl ShellTool {
    pub fn new(policy: ShellPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use for running programs, inspecting files, git operations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        ObjectSchema::new()
            .string("command", "The shell command to execute")
            .required(&["command"])
            .build()
    }

    fn danger_class(&self) -> DangerClass {
        DangerClass::Privileged
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'command' argument".into()))?;

        self.policy.check(command)?;

        debug!(command = %command, "Executing shell command");

        let output = if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", command]).output().await
        } else {
            Command::new("sh").args(["-c", command]).output().await
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let success = output.status.success();

                let result_text = if success {
                    if stderr.is_empty() {
                        stdout
                    } else {
                        format!("{stdout}\n[stderr]: {stderr}")
                    }
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    warn!(command = %command, exit_code = code, "Command failed");
                    format!("[exit code: {code}]\n{stdout}\n{stderr}")
                };

                if success {
                    Ok(ToolResult::success(result_text.trim().to_string())
                        .with_meta("command", command))
                } else {
                    Ok(ToolResult::error(result_text.trim().to_string())
                        .with_meta("command", command)
                        .with_meta("exit_code", output.status.code().unwrap_or(-1)))
                }
            }
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: "shell".into(),
                reason: e.to_string(),
            }),
        }
    }
}
