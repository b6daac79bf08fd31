//! End-to-end reasoner tests against a scripted provider.
//!
//! Covers the full pipeline: deterministic rules, memory classification
//! and recall, tool execution under confirmation, recovery from malformed
//! tool invocations, and the token budget.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ironmind_agent::{ConfirmationChannel, Reasoner, Service};
use ironmind_config::{AppConfig, ConfirmationMode};
use ironmind_core::error::ProviderError;
use ironmind_core::message::Role;
use ironmind_core::provider::{ChatProvider, ChatRequest, ChatResponse, ToolChoice, Usage};
use ironmind_core::rule::TriggerKind;
use ironmind_core::tool::ToolCall;

/// One scripted provider turn.
enum Step {
    Text(&'static str),
    Tool {
        name: &'static str,
        arguments: serde_json::Value,
    },
    Fail(ProviderError),
}

/// Plays back a fixed script and records every request it receives.
struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicU32,
    usage_per_call: u32,
}

impl ScriptedProvider {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            usage_per_call: 100,
        })
    }

    fn with_usage(steps: Vec<Step>, usage_per_call: u32) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            usage_per_call,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self, index: usize) -> ChatRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted: unexpected extra LLM call");

        let usage = Some(Usage {
            prompt_tokens: self.usage_per_call * 3 / 4,
            completion_tokens: self.usage_per_call / 4,
            total_tokens: self.usage_per_call,
        });

        match step {
            Step::Text(text) => Ok(ChatResponse {
                content: Some(text.into()),
                tool_calls: vec![],
                usage,
                model: request.model,
                finish_reason: Some("stop".into()),
            }),
            Step::Tool { name, arguments } => Ok(ChatResponse {
                content: None,
                tool_calls: vec![ToolCall {
                    id: format!("call_{}", self.calls()),
                    name: name.into(),
                    arguments,
                }],
                usage,
                model: request.model,
                finish_reason: Some("tool_calls".into()),
            }),
            Step::Fail(error) => Err(error),
        }
    }
}

/// Confirmation channel that records asks and answers a fixed way.
struct RecordingChannel {
    asked: AtomicU32,
    answer: bool,
}

impl RecordingChannel {
    fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            asked: AtomicU32::new(0),
            answer,
        })
    }

    fn asked(&self) -> u32 {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationChannel for RecordingChannel {
    async fn confirm(&self, _tool: &str, _operation: Option<&str>, _summary: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

fn test_config(workspace: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.sandbox.working_directory = workspace.to_path_buf();
    config.memory.persistent = false;
    config.provider.api_max_retries = 0;
    config
}

fn build(
    config: &AppConfig,
    provider: Arc<ScriptedProvider>,
    channel: Option<Arc<RecordingChannel>>,
) -> Reasoner {
    Service::build(
        config,
        provider,
        channel.map(|c| c as Arc<dyn ConfirmationChannel>),
    )
}

// --- Scenario A: deterministic rule short-circuits the LLM ---

#[tokio::test]
async fn rule_match_skips_llm_and_storage() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![]);
    let mut reasoner = build(&test_config(tmp.path()), provider.clone(), None);

    reasoner
        .rule_engine()
        .add("cekrek", TriggerKind::Contains, "memori terbaca", 0)
        .unwrap();

    let answer = reasoner.run("cekrek").await.unwrap();
    assert_eq!(answer, "memori terbaca");
    assert_eq!(provider.calls(), 0, "rules must answer without any LLM call");
    assert_eq!(reasoner.stores().experiences.count().await.unwrap(), 0);
}

// --- Scenario B: useless input produces no memory ---

#[tokio::test]
async fn useless_input_is_not_stored() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![Step::Text("Halo! Ada yang bisa saya bantu?")]);
    let mut reasoner = build(&test_config(tmp.path()), provider.clone(), None);

    let answer = reasoner.run("halo").await.unwrap();
    assert!(!answer.is_empty());
    assert_eq!(reasoner.stores().experiences.count().await.unwrap(), 0);
    assert_eq!(reasoner.stores().facts.count().await.unwrap(), 0);
    assert_eq!(reasoner.rule_engine().count(), 0);
}

// --- Scenario C: safe tool call in auto mode, truncated observation ---

#[tokio::test]
async fn auto_mode_reads_file_without_asking() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("README.md"), "x".repeat(700)).unwrap();

    let provider = ScriptedProvider::new(vec![
        Step::Tool {
            name: "filesystem",
            arguments: serde_json::json!({"operation": "read", "path": "README.md"}),
        },
        Step::Text("File README.md berhasil dibaca."),
    ]);
    let channel = RecordingChannel::new(true);
    let mut reasoner = build(&test_config(tmp.path()), provider.clone(), Some(channel.clone()));

    let answer = reasoner.run("baca file README.md").await.unwrap();
    assert!(answer.contains("berhasil"));
    assert_eq!(provider.calls(), 2);
    assert_eq!(channel.asked(), 0, "safe reads must not ask in auto mode");

    // The second request carries the truncated observation
    let second = provider.request(1);
    let observation = second
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool observation in window");
    assert!(observation.content.starts_with("Success: "));
    assert!(observation.content.contains("[... truncated 200 chars]"));

    // One experience is stored for the tool-using task
    assert_eq!(reasoner.stores().experiences.count().await.unwrap(), 1);
}

// --- Scenario D: recovery from a malformed tool invocation ---

#[tokio::test]
async fn tool_use_failure_recovers_with_stricter_settings() {
    let tmp = tempfile::tempdir().unwrap();

    let provider = ScriptedProvider::new(vec![
        Step::Fail(ProviderError::ToolUseFailed {
            message: "model emitted prose instead of a function call".into(),
            failed_generation: Some("print('xss test')".into()),
        }),
        Step::Tool {
            name: "code_generator",
            arguments: serde_json::json!({
                "filename": "xss_test.py",
                "code": "print('xss test')\n",
                "language": "python",
            }),
        },
        Step::Text("Script xss_test.py berhasil dibuat."),
    ]);
    let mut config = test_config(tmp.path());
    config.reasoner.confirmation_mode = ConfirmationMode::Yes;
    let mut reasoner = build(&config, provider.clone(), None);

    let answer = reasoner
        .run("tulis kode python untuk testing xss")
        .await
        .unwrap();
    assert!(answer.contains("berhasil"));
    assert_eq!(provider.calls(), 3);

    // The recovery request used forced tool choice and tighter sampling
    let recovery = provider.request(1);
    assert_eq!(recovery.tool_choice, ToolChoice::Required);
    assert!(recovery.temperature <= 0.1);
    assert_eq!(recovery.max_tokens, Some(768 / 2));
    // The corrective user message is in the window
    assert!(recovery
        .messages
        .iter()
        .any(|m| m.role == Role::User && m.content.contains("valid function call")));

    // The recovered tool call actually executed
    assert!(tmp.path().join("xss_test.py").exists());

    // The malformed invocation was logged
    let report = reasoner.error_memory().analyze(None, Some("llm")).await;
    assert_eq!(report.total, 1);
}

#[tokio::test]
async fn failed_recovery_falls_back_to_salvaged_text() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Step::Fail(ProviderError::ToolUseFailed {
            message: "malformed".into(),
            failed_generation: Some("partial answer from the model".into()),
        }),
        Step::Fail(ProviderError::AuthenticationFailed("key expired".into())),
    ]);
    let mut reasoner = build(&test_config(tmp.path()), provider.clone(), None);

    let answer = reasoner.run("do something complicated").await.unwrap();
    assert_eq!(answer, "partial answer from the model");
    assert_eq!(provider.calls(), 2);
}

// --- Scenario E: token budget stops the loop ---

#[tokio::test]
async fn budget_exceedance_finalizes_without_further_calls() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("a.txt"), "data").unwrap();

    // Each call costs 600 tokens against a 1000-token budget
    let provider = ScriptedProvider::with_usage(
        vec![
            Step::Tool {
                name: "filesystem",
                arguments: serde_json::json!({"operation": "read", "path": "a.txt"}),
            },
            Step::Tool {
                name: "filesystem",
                arguments: serde_json::json!({"operation": "read", "path": "a.txt"}),
            },
            Step::Text("never reached"),
        ],
        600,
    );
    let mut config = test_config(tmp.path());
    config.reasoner.max_tokens_per_task = 1000;
    let mut reasoner = build(&config, provider.clone(), None);

    let answer = reasoner.run("baca file a.txt berulang kali").await.unwrap();
    assert!(answer.contains("Token budget exceeded"), "{answer}");
    assert!(answer.contains("1000"));
    // The call that crossed the budget is the last one
    assert_eq!(provider.calls(), 2);
    // Overshoot is bounded by a single response
    assert!(600 * u64::from(provider.calls()) <= 1000 + 600);
}

// --- Scenario F: facts persist and are recalled across tasks ---

#[tokio::test]
async fn fact_is_stored_and_recalled_in_later_tasks() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Step::Text("Halo Budi, senang berkenalan!"),
        Step::Text("Nama kamu Budi."),
    ]);
    let mut reasoner = build(&test_config(tmp.path()), provider.clone(), None);

    reasoner.run("Nama saya Budi").await.unwrap();
    assert_eq!(reasoner.stores().facts.count().await.unwrap(), 1);

    let answer = reasoner.run("Siapa nama saya?").await.unwrap();
    assert!(answer.contains("Budi"));

    // The second task's system prompt carried the recalled fact
    let second = provider.request(1);
    assert_eq!(second.messages[0].role, Role::System);
    assert!(
        second.messages[0].content.contains("User's name is Budi"),
        "system prompt must contain the recalled fact"
    );
}

// --- Rule learning: utterance becomes a persistent rule ---

#[tokio::test]
async fn rule_utterance_becomes_deterministic_rule() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![Step::Text("Baik, aturan disimpan.")]);
    let mut reasoner = build(&test_config(tmp.path()), provider.clone(), None);

    reasoner
        .run("jika saya bilang cekrek, jawab memori terbaca")
        .await
        .unwrap();
    assert_eq!(reasoner.rule_engine().count(), 1);
    assert_eq!(provider.calls(), 1);

    // From now on the trigger answers without the LLM
    let answer = reasoner.run("cekrek").await.unwrap();
    assert_eq!(answer, "memori terbaca");
    assert_eq!(provider.calls(), 1, "no further LLM calls after the rule exists");
}

// --- Confirmation: denial becomes a blocked observation ---

#[tokio::test]
async fn denied_confirmation_blocks_execution() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Step::Tool {
            name: "filesystem",
            arguments: serde_json::json!({
                "operation": "write",
                "path": "danger.txt",
                "content": "should not be written",
            }),
        },
        Step::Text("Baik, operasi dibatalkan."),
    ]);
    let channel = RecordingChannel::new(false);
    let mut config = test_config(tmp.path());
    config.reasoner.confirmation_mode = ConfirmationMode::Auto;
    let mut reasoner = build(&config, provider.clone(), Some(channel.clone()));

    reasoner.run("tulis file danger.txt").await.unwrap();
    assert_eq!(channel.asked(), 1, "mutating writes ask in auto mode");
    assert!(!tmp.path().join("danger.txt").exists(), "denied call must not execute");

    let second = provider.request(1);
    let observation = second
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(observation.content.starts_with("Blocked: "));
    assert!(observation.content.contains("denied by user"));
}

#[tokio::test]
async fn no_mode_asks_for_safe_reads_too() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("ok.txt"), "fine").unwrap();

    let provider = ScriptedProvider::new(vec![
        Step::Tool {
            name: "filesystem",
            arguments: serde_json::json!({"operation": "read", "path": "ok.txt"}),
        },
        Step::Text("Isi file: fine"),
    ]);
    let channel = RecordingChannel::new(true);
    let mut config = test_config(tmp.path());
    config.reasoner.confirmation_mode = ConfirmationMode::No;
    let mut reasoner = build(&config, provider, Some(channel.clone()));

    reasoner.run("baca file ok.txt").await.unwrap();
    assert_eq!(channel.asked(), 1, "no mode asks for every call");
}

// --- Window invariants survive many tool cycles ---

#[tokio::test]
async fn window_preserves_system_and_task_through_pruning() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("f.txt"), "content").unwrap();

    let mut steps: Vec<Step> = (0..8)
        .map(|_| Step::Tool {
            name: "filesystem",
            arguments: serde_json::json!({"operation": "read", "path": "f.txt"}),
        })
        .collect();
    steps.push(Step::Text("Selesai membaca berulang."));

    let mut config = test_config(tmp.path());
    config.reasoner.max_context_messages = 6;
    config.reasoner.max_iterations = 20;
    let provider = ScriptedProvider::new(steps);
    let mut reasoner = build(&config, provider.clone(), None);

    let task = "baca file f.txt delapan kali";
    reasoner.run(task).await.unwrap();

    // Every request the provider saw kept the invariant
    for i in 0..provider.calls() as usize {
        let request = provider.request(i);
        assert!(request.messages.len() <= 6 + 1);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.messages[1].content, task);
    }

    // And the final window does too
    assert_eq!(reasoner.window()[0].role, Role::System);
    assert_eq!(reasoner.window()[1].content, task);
}

// --- Iteration cap synthesizes a final answer ---

#[tokio::test]
async fn iteration_cap_synthesizes_from_last_observation() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("f.txt"), "loop fodder").unwrap();

    let steps: Vec<Step> = (0..3)
        .map(|_| Step::Tool {
            name: "filesystem",
            arguments: serde_json::json!({"operation": "read", "path": "f.txt"}),
        })
        .collect();

    let mut config = test_config(tmp.path());
    config.reasoner.max_iterations = 3;
    let provider = ScriptedProvider::new(steps);
    let mut reasoner = build(&config, provider.clone(), None);

    let answer = reasoner.run("baca file f.txt selamanya").await.unwrap();
    assert!(answer.contains("3 tool iterations"));
    assert!(answer.contains("loop fodder"));
    assert_eq!(provider.calls(), 3);
}

// --- Tool failures are observable in error memory ---

#[tokio::test]
async fn tool_failure_produces_exactly_one_error_event() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Step::Tool {
            name: "filesystem",
            arguments: serde_json::json!({"operation": "read", "path": "missing.txt"}),
        },
        Step::Text("File tidak ditemukan."),
    ]);
    let mut reasoner = build(&test_config(tmp.path()), provider, None);

    reasoner.run("baca file missing.txt").await.unwrap();

    let report = reasoner.error_memory().analyze(None, None).await;
    assert_eq!(report.total, 1);
    assert_eq!(report.by_tool[0], ("filesystem".to_string(), 1));
    assert_eq!(report.by_operation[0].0, "read");
}

// --- Hygiene runs on the task counter ---

#[tokio::test]
async fn housekeeper_runs_every_interval() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.reasoner.hygiene_interval_tasks = 2;
    config.memory.facts_cap = 1;

    let provider = ScriptedProvider::new(vec![
        Step::Text("Salam kenal, Budi!"),
        Step::Text("Noted, kamu suka kopi."),
    ]);
    let mut reasoner = build(&config, provider, None);

    reasoner.run("Nama saya Budi").await.unwrap();
    assert_eq!(reasoner.stores().facts.count().await.unwrap(), 1);

    // Second task stores another fact, then hygiene caps the collection
    reasoner.run("saya suka kopi hitam").await.unwrap();
    assert_eq!(reasoner.stores().facts.count().await.unwrap(), 1);
}
