//! Tool confirmation policy.
//!
//! Decides per call whether to execute directly or ask the user first.
//! The effective danger of a call refines the tool's static class:
//! read-class filesystem operations are safe only when their path resolves
//! inside the workspace; sudo commands always ask while
//! `require_sudo_confirmation` is on.
//!
//! Asks go through a `ConfirmationChannel`. With no channel attached the
//! answer defaults to deny once the policy timeout elapses.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use ironmind_config::ConfirmationMode;
use ironmind_core::tool::{DangerClass, Tool};
use ironmind_tools::filesystem::READ_OPERATIONS;
use ironmind_tools::{SandboxPolicy, ShellPolicy};

/// The policy's verdict for one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Execute,
    Ask,
}

/// The user input channel for confirmation prompts.
#[async_trait]
pub trait ConfirmationChannel: Send + Sync {
    /// Ask the user to approve a tool call. Returns true to execute.
    async fn confirm(&self, tool_name: &str, operation: Option<&str>, summary: &str) -> bool;
}

/// Decides whether tool calls require confirmation.
pub struct ConfirmationPolicy {
    mode: ConfirmationMode,
    channel: Option<Arc<dyn ConfirmationChannel>>,
    ask_timeout: Duration,
    sandbox: Arc<SandboxPolicy>,
    require_sudo_confirmation: bool,
}

impl ConfirmationPolicy {
    pub fn new(
        mode: ConfirmationMode,
        channel: Option<Arc<dyn ConfirmationChannel>>,
        ask_timeout: Duration,
        sandbox: Arc<SandboxPolicy>,
        require_sudo_confirmation: bool,
    ) -> Self {
        Self {
            mode,
            channel,
            ask_timeout,
            sandbox,
            require_sudo_confirmation,
        }
    }

    pub fn mode(&self) -> ConfirmationMode {
        self.mode
    }

    /// Decide whether this call executes directly or asks first.
    pub fn decide(&self, tool: &dyn Tool, arguments: &serde_json::Value) -> Decision {
        // Sudo always confirms while the flag is on, regardless of mode
        if self.require_sudo_confirmation && tool.name() == "shell" {
            if let Some(command) = arguments.get("command").and_then(|v| v.as_str()) {
                if ShellPolicy::is_sudo(command) {
                    return Decision::Ask;
                }
            }
        }

        match self.mode {
            ConfirmationMode::Yes => Decision::Execute,
            ConfirmationMode::No => Decision::Ask,
            ConfirmationMode::Auto => {
                if self.effective_danger(tool, arguments) == DangerClass::Safe {
                    Decision::Execute
                } else {
                    Decision::Ask
                }
            }
        }
    }

    /// Refine the tool's static danger class for one specific call.
    ///
    /// Filesystem read-class operations are safe only inside the
    /// workspace; a path that resolves outside (or fails to resolve) is
    /// treated as mutating-equivalent.
    fn effective_danger(&self, tool: &dyn Tool, arguments: &serde_json::Value) -> DangerClass {
        if tool.name() == "filesystem" {
            let operation = arguments.get("operation").and_then(|v| v.as_str());
            if operation.is_some_and(|op| READ_OPERATIONS.contains(&op)) {
                if let Some(path) = arguments.get("path").and_then(|v| v.as_str()) {
                    return match self.sandbox.resolve(path) {
                        Ok(resolved) if self.sandbox.path_within_workspace(&resolved) => {
                            DangerClass::Safe
                        }
                        _ => DangerClass::Mutating,
                    };
                }
            }
            return tool.danger_class();
        }
        tool.danger_class()
    }

    /// Ask the user. No channel or no answer within the timeout means deny.
    pub async fn request(
        &self,
        tool_name: &str,
        operation: Option<&str>,
        summary: &str,
    ) -> bool {
        let Some(channel) = &self.channel else {
            debug!(tool = tool_name, "No confirmation channel attached, denying");
            return false;
        };
        match tokio::time::timeout(self.ask_timeout, channel.confirm(tool_name, operation, summary))
            .await
        {
            Ok(answer) => answer,
            Err(_) => {
                debug!(tool = tool_name, "Confirmation timed out, denying");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironmind_tools::default_registry;

    fn sandbox(tmp: &tempfile::TempDir) -> Arc<SandboxPolicy> {
        Arc::new(SandboxPolicy::new(
            true,
            tmp.path().to_path_buf(),
            vec![],
            vec![],
            10,
        ))
    }

    fn policy(mode: ConfirmationMode, tmp: &tempfile::TempDir) -> ConfirmationPolicy {
        ConfirmationPolicy::new(
            mode,
            None,
            Duration::from_millis(50),
            sandbox(tmp),
            true,
        )
    }

    #[test]
    fn auto_executes_safe_asks_dangerous() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(sandbox(&tmp), ShellPolicy::default());
        let p = policy(ConfirmationMode::Auto, &tmp);

        let fs = registry.get("filesystem").unwrap();
        let read_args = serde_json::json!({"operation": "read", "path": "notes.txt"});
        assert_eq!(p.decide(fs, &read_args), Decision::Execute);

        let write_args = serde_json::json!({"operation": "write", "path": "notes.txt", "content": "x"});
        assert_eq!(p.decide(fs, &write_args), Decision::Ask);

        let shell = registry.get("shell").unwrap();
        assert_eq!(
            p.decide(shell, &serde_json::json!({"command": "ls"})),
            Decision::Ask
        );

        let search = registry.get("web_search").unwrap();
        assert_eq!(
            p.decide(search, &serde_json::json!({"query": "rust"})),
            Decision::Execute
        );
    }

    #[test]
    fn auto_asks_for_out_of_sandbox_reads() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(sandbox(&tmp), ShellPolicy::default());
        let p = policy(ConfirmationMode::Auto, &tmp);

        let fs = registry.get("filesystem").unwrap();
        let outside = serde_json::json!({"operation": "read", "path": "/var/log/syslog"});
        assert_eq!(p.decide(fs, &outside), Decision::Ask);
    }

    #[test]
    fn yes_mode_never_asks_no_mode_always_asks() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(sandbox(&tmp), ShellPolicy::default());

        let yes = policy(ConfirmationMode::Yes, &tmp);
        let no = policy(ConfirmationMode::No, &tmp);

        let fs = registry.get("filesystem").unwrap();
        let shell = registry.get("shell").unwrap();
        let write_args = serde_json::json!({"operation": "write", "path": "a.txt", "content": "x"});
        let read_args = serde_json::json!({"operation": "read", "path": "a.txt"});

        assert_eq!(yes.decide(fs, &write_args), Decision::Execute);
        assert_eq!(
            yes.decide(shell, &serde_json::json!({"command": "ls"})),
            Decision::Execute
        );
        assert_eq!(no.decide(fs, &read_args), Decision::Ask);
        assert_eq!(no.decide(fs, &write_args), Decision::Ask);
    }

    #[test]
    fn sudo_always_asks_while_flag_is_on() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(sandbox(&tmp), ShellPolicy::default());
        let yes = policy(ConfirmationMode::Yes, &tmp);

        let shell = registry.get("shell").unwrap();
        assert_eq!(
            yes.decide(shell, &serde_json::json!({"command": "sudo apt update"})),
            Decision::Ask
        );
    }

    #[tokio::test]
    async fn no_channel_denies() {
        let tmp = tempfile::tempdir().unwrap();
        let p = policy(ConfirmationMode::Auto, &tmp);
        assert!(!p.request("shell", None, "shell: ls").await);
    }

    #[tokio::test]
    async fn channel_answer_is_respected() {
        struct Approve;
        #[async_trait]
        impl ConfirmationChannel for Approve {
            async fn confirm(&self, _tool: &str, _op: Option<&str>, _summary: &str) -> bool {
                true
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let p = ConfirmationPolicy::new(
            ConfirmationMode::Auto,
            Some(Arc::new(Approve)),
            Duration::from_secs(1),
            sandbox(&tmp),
            true,
        );
        assert!(p.request("shell", None, "shell: ls").await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_channel_times_out_to_deny() {
        struct Hang;
        #[async_trait]
        impl ConfirmationChannel for Hang {
            async fn confirm(&self, _tool: &str, _op: Option<&str>, _summary: &str) -> bool {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                true
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let p = ConfirmationPolicy::new(
            ConfirmationMode::Auto,
            Some(Arc::new(Hang)),
            Duration::from_secs(30),
            sandbox(&tmp),
            true,
        );
        assert!(!p.request("shell", None, "shell: ls").await);
    }
}
