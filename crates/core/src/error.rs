//! Error types for the IronMind domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Control-flow outcomes
//! that the reasoner must branch on (budget exhaustion, cancellation,
//! malformed tool use) are explicit variants, never panics.

use thiserror::Error;

/// The top-level error type for all IronMind operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors (fatal at startup) ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Resource governance ---
    #[error("Token budget exceeded: {used} of {limit} tokens")]
    BudgetExceeded { used: u64, limit: u64 },

    #[error("Cancelled: {reason}")]
    Cancelled { reason: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The provider rejected the response as a malformed tool invocation.
    /// `failed_generation` preserves the raw text the model produced so the
    /// reasoner's recovery path can salvage it.
    #[error("Tool use failed: {message}")]
    ToolUseFailed {
        message: String,
        failed_generation: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),
}

/// Whether an error is transient and worth retrying.
///
/// Network failures, timeouts, rate limits, and 5xx responses are retryable.
/// Authentication failures, malformed tool payloads, and everything outside
/// the provider context are not.
pub fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Provider(p) => match p {
            ProviderError::Network(_) | ProviderError::Timeout(_) => true,
            ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        },
        _ => false,
    }
}

/// Whether an error should surface to the user verbatim rather than being
/// absorbed as an observation for the LLM.
pub fn should_alert_user(error: &Error) -> bool {
    matches!(
        error,
        Error::Config { .. }
            | Error::BudgetExceeded { .. }
            | Error::Cancelled { .. }
            | Error::Provider(ProviderError::AuthenticationFailed(_))
    )
}
