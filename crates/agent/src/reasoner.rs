//! The reasoning loop orchestrator.
//!
//! One `run` drives a single task through the full pipeline: deterministic
//! rule check, memory retrieval and injection, the LLM turn/tool-execution
//! cycle, recovery from malformed tool invocations, and finalization with
//! classified storage and periodic hygiene.
//!
//! The reasoner owns the message window exclusively. The token budget is
//! per task: reset on entry, enforced before every LLM call, and checked
//! again before executing tools after the call that crossed it.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ironmind_core::error::{Error, ProviderError, Result};
use ironmind_core::message::Message;
use ironmind_core::provider::{ChatRequest, ChatResponse, ToolChoice};
use ironmind_core::record::{Experience, Fact, Lesson, Strategy};
use ironmind_core::rule::TriggerKind;
use ironmind_core::tool::{ToolResult, ToolStatus};
use ironmind_memory::{
    ErrorMemory, Housekeeper, MemoryClass, MemoryFilter, MemoryStores, Retriever, RuleEngine,
};
use ironmind_providers::LlmClient;
use ironmind_tools::ToolExecutor;

use crate::audit::ContextAudit;
use crate::confirmation::{ConfirmationPolicy, Decision};
use crate::prompt::{base_system_prompt, compose_system_prompt};
use crate::window::prune_window;

/// Per-run tunables, typically derived from `AppConfig`.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens_tool_turn: u32,
    pub max_iterations: u32,
    pub max_context_messages: usize,
    pub max_tokens_per_task: u64,
    pub tool_output_truncate_chars: usize,
    pub hygiene_interval_tasks: u64,
    /// Optional wall-clock limit per task
    pub task_timeout: Option<std::time::Duration>,
}

/// Everything the reasoner coordinates.
pub struct ReasonerDeps {
    pub llm: Arc<LlmClient>,
    pub executor: Arc<ToolExecutor>,
    pub rule_engine: Arc<RuleEngine>,
    pub retriever: Retriever,
    pub stores: MemoryStores,
    pub error_memory: Arc<ErrorMemory>,
    pub confirmation: ConfirmationPolicy,
    pub housekeeper: Housekeeper,
    pub audit: ContextAudit,
}

/// The per-session orchestrator. One task at a time: `run` takes
/// `&mut self`, so concurrent tasks on one session serialize at the
/// call site.
pub struct Reasoner {
    deps: ReasonerDeps,
    settings: RunSettings,
    filter: MemoryFilter,
    base_prompt: String,
    window: Vec<Message>,
    tasks_processed: u64,
}

impl Reasoner {
    pub fn new(deps: ReasonerDeps, settings: RunSettings) -> Self {
        let tool_names: Vec<&str> = deps.executor.registry().names();
        let base_prompt = base_system_prompt(&tool_names);
        Self {
            deps,
            settings,
            filter: MemoryFilter::new(),
            base_prompt,
            window: Vec::new(),
            tasks_processed: 0,
        }
    }

    /// The reasoning window as of the last run (tests and diagnostics).
    pub fn window(&self) -> &[Message] {
        &self.window
    }

    pub fn tasks_processed(&self) -> u64 {
        self.tasks_processed
    }

    /// The memory collections (tests and admin surfaces).
    pub fn stores(&self) -> &MemoryStores {
        &self.deps.stores
    }

    /// The rule engine (tests and admin surfaces).
    pub fn rule_engine(&self) -> &RuleEngine {
        &self.deps.rule_engine
    }

    /// The error memory (tests and admin surfaces).
    pub fn error_memory(&self) -> &ErrorMemory {
        &self.deps.error_memory
    }

    /// Run one task to completion. Always produces a non-empty final text;
    /// failures finalize with a message naming the failure class.
    pub async fn run(&mut self, task: &str) -> Result<String> {
        info!(task = %truncate(task, 80), "Task started");

        // S0: fresh window and per-task counters
        self.window = vec![Message::system(self.base_prompt.clone()), Message::user(task)];
        self.deps.llm.reset_stats();
        let mut tokens_used: u64 = 0;
        let mut actions: Vec<String> = Vec::new();
        let mut last_observation: Option<String> = None;
        let deadline = self.settings.task_timeout.map(|t| Instant::now() + t);

        // S1: deterministic rules short-circuit everything else
        if let Some(rule_match) = self.deps.rule_engine.match_input(task) {
            info!(rule_id = %rule_match.rule_id, "Rule matched, responding deterministically");
            return Ok(rule_match.response);
        }

        // S2: retrieve and inject memory context
        let bundle = self.deps.retriever.for_task(task).await;
        self.window[0] = Message::system(compose_system_prompt(
            &self.base_prompt,
            &Retriever::render(&bundle),
        ));

        let mut iteration: u32 = 0;
        let mut empty_retried = false;

        let final_text = loop {
            if iteration >= self.settings.max_iterations {
                warn!(iterations = iteration, "Iteration limit reached");
                break self.iteration_limit_text(&last_observation);
            }

            // S3: budget gate, prune, call
            if tokens_used >= self.settings.max_tokens_per_task {
                break self.budget_text(tokens_used, &last_observation);
            }
            self.window = prune_window(
                std::mem::take(&mut self.window),
                self.settings.max_context_messages,
                self.settings.max_tokens_per_task,
            );

            let request = ChatRequest {
                model: self.settings.model.clone(),
                messages: self.window.clone(),
                temperature: self.settings.temperature,
                max_tokens: Some(self.settings.max_tokens_tool_turn),
                tools: self.deps.executor.registry().definitions(),
                tool_choice: ToolChoice::Auto,
            };

            let response = match self.deps.llm.chat_with_tools(request, deadline).await {
                Ok(response) => response,
                Err(Error::Provider(ProviderError::ToolUseFailed {
                    message,
                    failed_generation,
                })) => {
                    // S6: corrective retry with stricter settings
                    warn!(error = %message, "Malformed tool invocation, entering recovery");
                    self.deps
                        .error_memory
                        .log("llm", "chat", &message, serde_json::Map::new())
                        .await;
                    match self.recovery_turn(deadline).await {
                        Some(recovered) => recovered,
                        None => {
                            break failed_generation
                                .filter(|t| !t.is_empty())
                                .unwrap_or_else(|| {
                                    "The model could not produce a valid tool call; no result is available.".into()
                                })
                        }
                    }
                }
                Err(Error::Cancelled { reason }) => {
                    break self.cancelled_text(&reason, &last_observation);
                }
                Err(e) => {
                    warn!(error = %e, "LLM call failed, finalizing");
                    break format!("LLM unavailable: {e}");
                }
            };

            if let Some(usage) = &response.usage {
                tokens_used += usage.total_tokens as u64;
                debug!(tokens_used, budget = self.settings.max_tokens_per_task, "Token accounting");
            }

            // S4: dispatch
            if response.has_tool_calls() {
                // The call that crossed the budget does not get its tools
                // executed; finalize with the budget message instead.
                if tokens_used > self.settings.max_tokens_per_task {
                    break self.budget_text(tokens_used, &last_observation);
                }

                // S5: execute sequentially in the returned order
                let content = response.content.clone().unwrap_or_default();
                self.window.push(Message::assistant_with_tool_calls(
                    content,
                    response.tool_calls.clone(),
                ));

                for call in &response.tool_calls {
                    let observation = self.execute_one(task, call, &mut actions).await;
                    last_observation = Some(observation.clone());
                    self.window
                        .push(Message::tool_observation(&call.id, &call.name, observation));
                }
                iteration += 1;
                continue;
            }

            if let Some(content) = response.content {
                break content;
            }

            // Empty response: one retry, then a fallback text
            if !empty_retried {
                empty_retried = true;
                warn!("Empty LLM response, retrying once");
                continue;
            }
            break "Task completed.".into();
        };

        // S7: classify, store, hygiene
        self.finalize(task, &final_text, &actions).await;
        Ok(final_text)
    }

    /// Execute one tool call under preflight, confirmation, and mediation.
    /// Returns the observation string appended to the window.
    async fn execute_one(
        &self,
        task: &str,
        call: &ironmind_core::tool::ToolCall,
        actions: &mut Vec<String>,
    ) -> String {
        let operation = call.arguments["operation"]
            .as_str()
            .unwrap_or("execute")
            .to_string();
        let action_name = format!("{}.{}", call.name, operation);

        let preflight = self
            .deps
            .error_memory
            .preflight(&call.name, &operation, &call.arguments)
            .await;
        if !preflight.warnings.is_empty() {
            info!(
                tool = %call.name,
                warnings = preflight.warnings.len(),
                confidence = preflight.confidence,
                "Preflight warnings from past errors"
            );
        }

        let decision = self
            .deps
            .executor
            .registry()
            .get(&call.name)
            .map(|tool| self.deps.confirmation.decide(tool, &call.arguments))
            // Unknown tools go straight to the executor, which reports them
            .unwrap_or(Decision::Execute);

        let result = match decision {
            Decision::Ask => {
                let summary = summarize_arguments(&call.arguments);
                if self
                    .deps
                    .confirmation
                    .request(&call.name, Some(&operation), &summary)
                    .await
                {
                    self.deps.executor.execute(call).await
                } else {
                    info!(tool = %call.name, "Tool call declined by user");
                    ToolResult::blocked(format!("Tool {} denied by user", call.name))
                }
            }
            Decision::Execute => self.deps.executor.execute(call).await,
        };

        if result.is_success() {
            actions.push(action_name.clone());
        }

        let observation =
            ToolExecutor::render_observation(&result, self.settings.tool_output_truncate_chars);
        self.deps
            .audit
            .record(task, &action_name, &observation, status_label(result.status));
        observation
    }

    /// S6: append a corrective message and re-call with stricter settings.
    /// Returns None when recovery itself fails.
    async fn recovery_turn(&mut self, deadline: Option<Instant>) -> Option<ChatResponse> {
        self.window.push(Message::user(
            "Your previous reply was not a valid function call. \
             Call exactly one of the available tools with valid JSON arguments. \
             Do not write code or prose outside a tool call.",
        ));

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: self.window.clone(),
            temperature: 0.1_f32.min(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens_tool_turn / 2),
            tools: self.deps.executor.registry().definitions(),
            tool_choice: ToolChoice::Required,
        };

        match self.deps.llm.chat_with_tools(request, deadline).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(error = %e, "Recovery turn failed");
                None
            }
        }
    }

    /// S7: classify the interaction, store accordingly, run hygiene.
    async fn finalize(&mut self, task: &str, final_text: &str, actions: &[String]) {
        let success = outcome_succeeded(final_text);

        match self
            .filter
            .classify(task, final_text, success, actions.len())
        {
            MemoryClass::Rule => {
                if let Some(draft) = self.filter.extract_rule(task) {
                    match self.deps.rule_engine.add(
                        draft.trigger.clone(),
                        TriggerKind::Contains,
                        draft.response.clone(),
                        0,
                    ) {
                        Ok(id) => info!(rule_id = %id, trigger = %draft.trigger, "Rule stored"),
                        Err(e) => warn!(error = %e, "Failed to store rule"),
                    }
                }
            }
            MemoryClass::Fact => {
                if let Some(draft) = self.filter.extract_fact(task) {
                    let fact =
                        Fact::new(draft.category.clone(), draft.value.clone()).with_statement(task);
                    if let Err(e) = self
                        .deps
                        .stores
                        .facts
                        .upsert(&fact.id, &fact.to_document(), fact.to_metadata())
                        .await
                    {
                        warn!(error = %e, "Failed to store fact");
                    } else {
                        info!(category = %draft.category, "Fact stored");
                    }
                }
            }
            MemoryClass::Experience => {
                let experience = Experience::new(
                    task,
                    actions.to_vec(),
                    truncate(final_text, 500),
                    success,
                );
                if let Err(e) = self
                    .deps
                    .stores
                    .experiences
                    .upsert(
                        &experience.id,
                        &experience.to_document(),
                        experience.to_metadata(),
                    )
                    .await
                {
                    warn!(error = %e, "Failed to store experience");
                } else {
                    info!(success, actions = actions.len(), "Experience stored");
                }
                self.derive_guidance(task, final_text, success, actions).await;
            }
            MemoryClass::Useless => {
                debug!("Interaction classified as not worth storing");
            }
        }

        self.tasks_processed += 1;
        if self.tasks_processed % self.settings.hygiene_interval_tasks == 0 {
            let report = self.deps.housekeeper.run().await;
            debug!(removed = report.total_removed(), "Hygiene complete");
        }
    }

    /// Derive guidance from a stored experience: failures become lessons,
    /// successful tool sequences reinforce a strategy for that task type.
    async fn derive_guidance(&self, task: &str, final_text: &str, success: bool, actions: &[String]) {
        if success && !actions.is_empty() {
            let task_type = actions[0].split('.').next().unwrap_or("general").to_string();
            let strategy = Strategy::new(actions.join(" -> "), task_type, 1.0);
            if let Err(e) = self
                .deps
                .stores
                .strategies
                .upsert(&strategy.id, &strategy.to_document(), strategy.to_metadata())
                .await
            {
                warn!(error = %e, "Failed to store strategy");
            }
        } else if !success {
            let lesson = Lesson::new(
                format!("Approach did not work for: {}", truncate(task, 120)),
                truncate(final_text, 200),
                "failure",
                0.7,
            );
            if let Err(e) = self
                .deps
                .stores
                .lessons
                .upsert(&lesson.id, &lesson.to_document(), lesson.to_metadata())
                .await
            {
                warn!(error = %e, "Failed to store lesson");
            }
        }
    }

    fn budget_text(&self, used: u64, last_observation: &Option<String>) -> String {
        let mut text = format!(
            "Token budget exceeded: {used} of {} tokens used; stopping here.",
            self.settings.max_tokens_per_task
        );
        if let Some(obs) = last_observation {
            text.push_str(&format!(" Last observation: {}", truncate(obs, 300)));
        }
        text
    }

    fn iteration_limit_text(&self, last_observation: &Option<String>) -> String {
        let mut text = format!(
            "Reached the limit of {} tool iterations without a final answer.",
            self.settings.max_iterations
        );
        if let Some(obs) = last_observation {
            text.push_str(&format!(" Last observation: {}", truncate(obs, 300)));
        }
        text
    }

    fn cancelled_text(&self, reason: &str, last_observation: &Option<String>) -> String {
        let mut text = format!("Task cancelled: {reason}.");
        if let Some(obs) = last_observation {
            text.push_str(&format!(" Last observation: {}", truncate(obs, 300)));
        }
        text
    }
}

/// Task-level success heuristic over the final text.
fn outcome_succeeded(final_text: &str) -> bool {
    let lower = final_text.to_lowercase();
    !(lower.contains("error") || lower.contains("failed") || lower.contains("gagal"))
}

fn status_label(status: ToolStatus) -> &'static str {
    match status {
        ToolStatus::Success => "success",
        ToolStatus::Error => "error",
        ToolStatus::Blocked => "blocked",
        ToolStatus::Timeout => "timeout",
    }
}

/// Short argument summary for confirmation prompts.
fn summarize_arguments(arguments: &serde_json::Value) -> String {
    let Some(obj) = arguments.as_object() else {
        return arguments.to_string();
    };
    let mut parts: Vec<String> = Vec::new();
    for key in ["operation", "path", "command", "filename", "query"] {
        if let Some(value) = obj.get(key).and_then(|v| v.as_str()) {
            parts.push(format!("{key}={}", truncate(value, 60)));
        }
    }
    if parts.is_empty() {
        for (key, value) in obj.iter().take(3) {
            parts.push(format!("{key}={}", truncate(&value.to_string(), 40)));
        }
    }
    parts.join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}
