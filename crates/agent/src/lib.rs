//! The IronMind reasoning orchestrator.
//!
//! - `reasoner`: the per-task state machine driving rule checks, memory
//!   retrieval, LLM turns, tool execution, and storage
//! - `confirmation`: the tool confirmation policy and user channel
//! - `window`: token estimation and reasoning-window pruning
//! - `prompt`: system prompt assembly
//! - `audit`: the optional per-turn context audit log
//! - `service`: wires configuration into a ready-to-run reasoner

pub mod audit;
pub mod confirmation;
pub mod prompt;
pub mod reasoner;
pub mod service;
pub mod window;

pub use confirmation::{ConfirmationChannel, ConfirmationPolicy, Decision};
pub use reasoner::Reasoner;
pub use service::Service;
