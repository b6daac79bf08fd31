//! Service assembly: wires configuration into a ready-to-run reasoner.
//!
//! All state is carried here explicitly and built once at startup; nothing
//! is ambient. Tests swap in an in-memory variant with a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use ironmind_config::AppConfig;
use ironmind_core::provider::ChatProvider;
use ironmind_memory::{
    CollectionCaps, ErrorMemory, Housekeeper, MemoryStores, RetrievalLimits, Retriever, RuleEngine,
};
use ironmind_providers::client::{ClientSettings, LlmClient};
use ironmind_tools::{default_registry, SandboxPolicy, ShellPolicy, ToolExecutor};

use crate::audit::ContextAudit;
use crate::confirmation::{ConfirmationChannel, ConfirmationPolicy};
use crate::reasoner::{Reasoner, ReasonerDeps, RunSettings};

/// Builds the full service context from configuration.
pub struct Service;

impl Service {
    /// Assemble a reasoner around the given chat provider and optional
    /// confirmation channel.
    pub fn build(
        config: &AppConfig,
        provider: Arc<dyn ChatProvider>,
        channel: Option<Arc<dyn ConfirmationChannel>>,
    ) -> Reasoner {
        let workspace = &config.sandbox.working_directory;

        let stores = if config.memory.persistent {
            MemoryStores::persistent(workspace)
        } else {
            MemoryStores::in_memory()
        };

        let rule_engine = Arc::new(if config.memory.persistent {
            RuleEngine::persistent(workspace)
        } else {
            RuleEngine::in_memory()
        });

        let error_memory = Arc::new(if config.memory.persistent {
            ErrorMemory::persistent(stores.errors.clone(), workspace)
        } else {
            ErrorMemory::in_memory(stores.errors.clone())
        });

        let audit = if config.memory.persistent {
            ContextAudit::persistent(workspace)
        } else {
            ContextAudit::disabled()
        };

        let sandbox = Arc::new(SandboxPolicy::new(
            config.sandbox.sandbox_mode,
            workspace.clone(),
            config.sandbox.blocked_paths.clone(),
            config.sandbox.allowed_extensions.clone(),
            config.sandbox.max_file_size_mb,
        ));
        let shell_policy = ShellPolicy {
            whitelist: config.sandbox.command_whitelist.clone(),
            superuser_mode: config.sandbox.superuser_mode,
            sudo_whitelist: config.sandbox.sudo_whitelist.clone(),
            dangerous_blocklist: config.sandbox.dangerous_commands_blocklist.clone(),
        };

        let registry = Arc::new(default_registry(sandbox.clone(), shell_policy));
        let executor = Arc::new(ToolExecutor::new(
            registry,
            error_memory.clone(),
            Duration::from_secs(config.sandbox.tool_timeout_seconds),
        ));

        let llm = Arc::new(LlmClient::new(
            provider,
            ClientSettings {
                max_retries: config.provider.api_max_retries,
                retry_delay: Duration::from_secs_f64(config.provider.api_retry_delay_seconds),
                rate_limit_rpm: config.provider.rate_limit_rpm,
            },
        ));

        let retriever = Retriever::new(
            rule_engine.clone(),
            stores.clone(),
            RetrievalLimits {
                facts: config.memory.facts_k,
                experiences: config.memory.experiences_k,
                lessons: config.memory.lessons_k,
                strategies: config.memory.strategies_k,
            },
        );

        let confirmation = ConfirmationPolicy::new(
            config.reasoner.confirmation_mode,
            channel,
            Duration::from_secs(config.reasoner.confirmation_timeout_seconds),
            sandbox,
            config.sandbox.require_sudo_confirmation,
        );

        let housekeeper = Housekeeper::new(
            stores.clone(),
            config.memory.max_age_days,
            CollectionCaps {
                experiences: config.memory.experiences_cap,
                lessons: config.memory.lessons_cap,
                strategies: config.memory.strategies_cap,
                facts: config.memory.facts_cap,
                errors: config.memory.errors_cap,
            },
        );

        let settings = RunSettings {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens_tool_turn: config.provider.max_tokens_tool_turn,
            max_iterations: config.reasoner.max_iterations,
            max_context_messages: config.reasoner.max_context_messages,
            max_tokens_per_task: config.reasoner.max_tokens_per_task,
            tool_output_truncate_chars: config.reasoner.tool_output_truncate_chars,
            hygiene_interval_tasks: config.reasoner.hygiene_interval_tasks,
            task_timeout: None,
        };

        Reasoner::new(
            ReasonerDeps {
                llm,
                executor,
                rule_engine,
                retriever,
                stores,
                error_memory,
                confirmation,
                housekeeper,
                audit,
            },
            settings,
        )
    }
}
