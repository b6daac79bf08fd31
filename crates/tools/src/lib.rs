//! Built-in tool implementations and the tool mediation layer.
//!
//! Tools give the agent the ability to act: read and write files, execute
//! shell commands, search the web, scaffold code and web pages. Every tool
//! call is mediated by `ToolExecutor`, which applies sandbox checks, a hard
//! timeout, error-memory logging, and output truncation.

pub mod code_generator;
pub mod executor;
pub mod filesystem;
pub mod sandbox;
pub mod shell;
pub mod web_generator;
pub mod web_search;

use std::sync::Arc;

use ironmind_core::tool::ToolRegistry;

pub use executor::ToolExecutor;
pub use sandbox::SandboxPolicy;
pub use shell::ShellPolicy;

/// Create the default tool registry with all built-in tools.
pub fn default_registry(sandbox: Arc<SandboxPolicy>, shell_policy: ShellPolicy) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(filesystem::FilesystemTool::new(sandbox.clone())));
    registry.register(Box::new(shell::ShellTool::new(shell_policy)));
    registry.register(Box::new(web_search::WebSearchTool::new()));
    registry.register(Box::new(code_generator::CodeGeneratorTool::new(
        sandbox.clone(),
    )));
    registry.register(Box::new(web_generator::WebGeneratorTool::new(sandbox)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let sandbox = Arc::new(SandboxPolicy::permissive(std::env::temp_dir()));
        let registry = default_registry(sandbox, ShellPolicy::default());

        for name in [
            "filesystem",
            "shell",
            "web_search",
            "code_generator",
            "web_generator",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
        assert_eq!(registry.len(), 5);
    }
}
