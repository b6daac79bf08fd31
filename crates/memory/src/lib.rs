//! Memory system for IronMind.
//!
//! Persistent, type-segregated storage behind a vector-store contract:
//! - `store`: the `VectorStore` trait shared by all collections
//! - `in_memory` / `file_store`: the two backends (keyword-match fallback,
//!   JSONL persistence)
//! - `stores`: the five typed collections bundled together
//! - `rule_engine`: deterministic trigger/response rules checked before
//!   any LLM reasoning
//! - `filter`: classifies completed interactions (rule / fact / experience
//!   / useless)
//! - `retrieval`: assembles the typed context bundle injected into the
//!   system prompt
//! - `error_memory`: error logging, pattern analysis, and remediation
//! - `housekeeper`: periodic age and size hygiene

pub mod error_memory;
pub mod filter;
pub mod file_store;
pub mod housekeeper;
pub mod in_memory;
pub mod retrieval;
pub mod rule_engine;
pub mod store;
pub mod stores;

pub use error_memory::{ErrorMemory, PatternReport, Preflight};
pub use filter::{FactDraft, MemoryClass, MemoryFilter, RuleDraft};
pub use file_store::FileStore;
pub use housekeeper::{CollectionCaps, Housekeeper, HygieneReport};
pub use in_memory::InMemoryStore;
pub use retrieval::{MemoryBundle, RetrievalLimits, Retriever};
pub use rule_engine::RuleEngine;
pub use store::{QueryHit, StoredItem, VectorStore};
pub use stores::MemoryStores;
