//! Configuration loading, validation, and management for IronMind.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Validates all settings at startup; invalid configuration is
//! fatal before any task runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// When the agent asks the user before executing a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    /// Always execute without asking
    Yes,
    /// Always ask
    No,
    /// Ask only when the effective danger class is not safe (default)
    #[default]
    Auto,
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Reasoning loop settings
    #[serde(default)]
    pub reasoner: ReasonerSettings,

    /// Sandbox and tool safety settings
    #[serde(default)]
    pub sandbox: SandboxSettings,

    /// Memory and hygiene settings
    #[serde(default)]
    pub memory: MemorySettings,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("reasoner", &self.reasoner)
            .field("sandbox", &self.sandbox)
            .field("memory", &self.memory)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key; usually supplied via IRONMIND_API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat completions endpoint base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for tool-use turns
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens for a plain text response
    #[serde(default = "default_max_tokens_per_response")]
    pub max_tokens_per_response: u32,

    /// Max tokens for a tool-use turn
    #[serde(default = "default_max_tokens_tool_turn")]
    pub max_tokens_tool_turn: u32,

    /// Maximum retry attempts on transient errors
    #[serde(default = "default_api_max_retries")]
    pub api_max_retries: u32,

    /// Initial retry delay in seconds (doubles per attempt)
    #[serde(default = "default_api_retry_delay_seconds")]
    pub api_retry_delay_seconds: f64,

    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,

    /// Maximum requests per minute through the rate limiter
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens_per_response", &self.max_tokens_per_response)
            .field("max_tokens_tool_turn", &self.max_tokens_tool_turn)
            .field("api_max_retries", &self.api_max_retries)
            .field("api_retry_delay_seconds", &self.api_retry_delay_seconds)
            .field("api_timeout_seconds", &self.api_timeout_seconds)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .finish()
    }
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens_per_response() -> u32 {
    1024
}
fn default_max_tokens_tool_turn() -> u32 {
    768
}
fn default_api_max_retries() -> u32 {
    3
}
fn default_api_retry_delay_seconds() -> f64 {
    1.0
}
fn default_api_timeout_seconds() -> u64 {
    60
}
fn default_rate_limit_rpm() -> u32 {
    30
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens_per_response: default_max_tokens_per_response(),
            max_tokens_tool_turn: default_max_tokens_tool_turn(),
            api_max_retries: default_api_max_retries(),
            api_retry_delay_seconds: default_api_retry_delay_seconds(),
            api_timeout_seconds: default_api_timeout_seconds(),
            rate_limit_rpm: default_rate_limit_rpm(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerSettings {
    /// Maximum tool-calling iterations per task
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Window pruning trigger (message count)
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,

    /// Hard token budget per task
    #[serde(default = "default_max_tokens_per_task")]
    pub max_tokens_per_task: u64,

    /// Characters kept from a tool observation before truncation
    #[serde(default = "default_tool_output_truncate_chars")]
    pub tool_output_truncate_chars: usize,

    /// Tool confirmation mode
    #[serde(default)]
    pub confirmation_mode: ConfirmationMode,

    /// Seconds to wait for a confirmation answer before denying
    #[serde(default = "default_confirmation_timeout_seconds")]
    pub confirmation_timeout_seconds: u64,

    /// Run the housekeeper every N tasks
    #[serde(default = "default_hygiene_interval_tasks")]
    pub hygiene_interval_tasks: u64,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_context_messages() -> usize {
    20
}
fn default_max_tokens_per_task() -> u64 {
    20_000
}
fn default_tool_output_truncate_chars() -> usize {
    500
}
fn default_confirmation_timeout_seconds() -> u64 {
    30
}
fn default_hygiene_interval_tasks() -> u64 {
    10
}

impl Default for ReasonerSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_context_messages: default_max_context_messages(),
            max_tokens_per_task: default_max_tokens_per_task(),
            tool_output_truncate_chars: default_tool_output_truncate_chars(),
            confirmation_mode: ConfirmationMode::default(),
            confirmation_timeout_seconds: default_confirmation_timeout_seconds(),
            hygiene_interval_tasks: default_hygiene_interval_tasks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// When on, file paths must resolve inside the working directory
    #[serde(default = "default_true")]
    pub sandbox_mode: bool,

    /// Workspace root for file operations and persistent state
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// File extensions the filesystem tool may touch
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Path prefixes that are never accessible
    #[serde(default = "default_blocked_paths")]
    pub blocked_paths: Vec<String>,

    /// Maximum file size in MB for reads and writes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Shell commands the agent may run (empty = none)
    #[serde(default = "default_command_whitelist")]
    pub command_whitelist: Vec<String>,

    /// Hard timeout per tool call in seconds
    #[serde(default = "default_tool_timeout_seconds")]
    pub tool_timeout_seconds: u64,

    /// Allow sudo at all
    #[serde(default)]
    pub superuser_mode: bool,

    /// Even with superuser_mode, sudo commands still confirm
    #[serde(default = "default_true")]
    pub require_sudo_confirmation: bool,

    /// Commands allowed under sudo when superuser_mode is on
    #[serde(default)]
    pub sudo_whitelist: Vec<String>,

    /// Commands blocked unconditionally, sudo or not
    #[serde(default = "default_dangerous_commands")]
    pub dangerous_commands_blocklist: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_working_directory() -> PathBuf {
    PathBuf::from("workspace")
}
fn default_allowed_extensions() -> Vec<String> {
    [
        ".py", ".txt", ".md", ".json", ".yaml", ".yml", ".sh", ".js", ".ts", ".html", ".css",
        ".rs", ".toml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_blocked_paths() -> Vec<String> {
    ["/etc", "/sys", "/proc", "/root", "~/.ssh", "~/.gnupg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_file_size_mb() -> u64 {
    10
}
fn default_command_whitelist() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep", "find",
        "which", "git", "python", "pip", "node", "npm", "cargo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_tool_timeout_seconds() -> u64 {
    300
}
fn default_dangerous_commands() -> Vec<String> {
    [
        "rm -rf /", "mkfs", "dd if=", "shutdown", "reboot", "halt", ":(){", "chmod -R 777 /",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            sandbox_mode: true,
            working_directory: default_working_directory(),
            allowed_extensions: default_allowed_extensions(),
            blocked_paths: default_blocked_paths(),
            max_file_size_mb: default_max_file_size_mb(),
            command_whitelist: default_command_whitelist(),
            tool_timeout_seconds: default_tool_timeout_seconds(),
            superuser_mode: false,
            require_sudo_confirmation: true,
            sudo_whitelist: vec![],
            dangerous_commands_blocklist: default_dangerous_commands(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Persist collections to disk (JSONL under the workspace)
    #[serde(default = "default_true")]
    pub persistent: bool,

    /// Age threshold for housekeeping, in days
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    /// Per-collection size caps enforced by the housekeeper
    #[serde(default = "default_collection_cap")]
    pub experiences_cap: usize,
    #[serde(default = "default_collection_cap")]
    pub lessons_cap: usize,
    #[serde(default = "default_collection_cap")]
    pub strategies_cap: usize,
    #[serde(default = "default_collection_cap")]
    pub facts_cap: usize,
    #[serde(default = "default_errors_cap")]
    pub errors_cap: usize,

    /// Retrieval depth per collection
    #[serde(default = "default_facts_k")]
    pub facts_k: usize,
    #[serde(default = "default_experiences_k")]
    pub experiences_k: usize,
    #[serde(default = "default_lessons_k")]
    pub lessons_k: usize,
    #[serde(default = "default_strategies_k")]
    pub strategies_k: usize,
}

fn default_max_age_days() -> i64 {
    90
}
fn default_collection_cap() -> usize {
    500
}
fn default_errors_cap() -> usize {
    1000
}
fn default_facts_k() -> usize {
    5
}
fn default_experiences_k() -> usize {
    3
}
fn default_lessons_k() -> usize {
    3
}
fn default_strategies_k() -> usize {
    3
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            persistent: true,
            max_age_days: default_max_age_days(),
            experiences_cap: default_collection_cap(),
            lessons_cap: default_collection_cap(),
            strategies_cap: default_collection_cap(),
            facts_cap: default_collection_cap(),
            errors_cap: default_errors_cap(),
            facts_k: default_facts_k(),
            experiences_k: default_experiences_k(),
            lessons_k: default_lessons_k(),
            strategies_k: default_strategies_k(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`ironmind.toml` in the
    /// current directory), falling back to defaults when absent, then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = PathBuf::from("ironmind.toml");
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Environment variables override file values:
    /// `IRONMIND_API_KEY`, `IRONMIND_API_URL`, `IRONMIND_MODEL`,
    /// `IRONMIND_WORKING_DIRECTORY`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("IRONMIND_API_KEY") {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("IRONMIND_API_URL") {
            if !url.is_empty() {
                self.provider.api_url = url;
            }
        }
        if let Ok(model) = std::env::var("IRONMIND_MODEL") {
            if !model.is_empty() {
                self.provider.model = model;
            }
        }
        if let Ok(dir) = std::env::var("IRONMIND_WORKING_DIRECTORY") {
            if !dir.is_empty() {
                self.sandbox.working_directory = PathBuf::from(dir);
            }
        }
    }

    /// Validate settings. Called at startup; failures are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reasoner.max_iterations == 0 || self.reasoner.max_iterations > 50 {
            return Err(ConfigError::Invalid(
                "max_iterations must be between 1 and 50".into(),
            ));
        }
        if self.reasoner.max_context_messages < 4 {
            return Err(ConfigError::Invalid(
                "max_context_messages must be at least 4".into(),
            ));
        }
        if self.reasoner.max_tokens_per_task < 1000 {
            return Err(ConfigError::Invalid(
                "max_tokens_per_task must be at least 1000".into(),
            ));
        }
        if self.provider.max_tokens_per_response < 64 {
            return Err(ConfigError::Invalid(
                "max_tokens_per_response must be at least 64".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.provider.rate_limit_rpm == 0 {
            return Err(ConfigError::Invalid("rate_limit_rpm must be positive".into()));
        }
        if self.provider.api_retry_delay_seconds <= 0.0 {
            return Err(ConfigError::Invalid(
                "api_retry_delay_seconds must be positive".into(),
            ));
        }
        for ext in &self.sandbox.allowed_extensions {
            if !ext.starts_with('.') {
                return Err(ConfigError::Invalid(format!(
                    "extension must start with a dot: {ext}"
                )));
            }
        }
        if self.sandbox.max_file_size_mb == 0 || self.sandbox.max_file_size_mb > 100 {
            return Err(ConfigError::Invalid(
                "max_file_size_mb must be between 1 and 100".into(),
            ));
        }
        if self.reasoner.hygiene_interval_tasks == 0 {
            return Err(ConfigError::Invalid(
                "hygiene_interval_tasks must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The API key, required for live provider use.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.provider
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "API key is required; set IRONMIND_API_KEY or provider.api_key".into(),
                )
            })
    }
}
