//! # IronMind Core
//!
//! Domain types, traits, and error definitions for the IronMind agent runtime.
//! This crate defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod record;
pub mod rule;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{is_retryable, should_alert_user, Error, Result};
pub use message::{Message, Role};
pub use provider::{ChatProvider, ChatRequest, ChatResponse, ToolChoice, ToolDefinition, Usage};
pub use record::{
    ActionKind, ErrorEvent, Experience, Fact, Lesson, Remediation, Severity, Strategy,
};
pub use rule::{Rule, RuleMatch, TriggerKind};
pub use tool::{DangerClass, Tool, ToolCall, ToolRegistry, ToolResult, ToolStatus};
