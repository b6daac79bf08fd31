//! The five typed collections bundled into one handle.
//!
//! Collections: experiences, lessons, strategies, facts, errors. The whole
//! bundle is either persistent (JSONL files under `.memory/`) or ephemeral
//! (in-process). Mutations are serialized per collection; readers see their
//! own prior writes.

use std::path::Path;
use std::sync::Arc;

use crate::file_store::FileStore;
use crate::in_memory::InMemoryStore;
use crate::store::VectorStore;

/// Handle to all memory collections.
#[derive(Clone)]
pub struct MemoryStores {
    pub experiences: Arc<dyn VectorStore>,
    pub lessons: Arc<dyn VectorStore>,
    pub strategies: Arc<dyn VectorStore>,
    pub facts: Arc<dyn VectorStore>,
    pub errors: Arc<dyn VectorStore>,
}

impl MemoryStores {
    /// Ephemeral collections. Persistence is a no-op; callers opt into this
    /// for tests and one-shot sessions.
    pub fn in_memory() -> Self {
        Self {
            experiences: Arc::new(InMemoryStore::new()),
            lessons: Arc::new(InMemoryStore::new()),
            strategies: Arc::new(InMemoryStore::new()),
            facts: Arc::new(InMemoryStore::new()),
            errors: Arc::new(InMemoryStore::new()),
        }
    }

    /// Persistent collections under `<workspace>/.memory/`.
    pub fn persistent(working_directory: &Path) -> Self {
        let dir = working_directory.join(".memory");
        Self {
            experiences: Arc::new(FileStore::new(dir.join("experiences.jsonl"))),
            lessons: Arc::new(FileStore::new(dir.join("lessons.jsonl"))),
            strategies: Arc::new(FileStore::new(dir.join("strategies.jsonl"))),
            facts: Arc::new(FileStore::new(dir.join("facts.jsonl"))),
            errors: Arc::new(FileStore::new(dir.join("errors.jsonl"))),
        }
    }

    /// All collections with their names, for hygiene sweeps and stats.
    pub fn named(&self) -> [(&'static str, &Arc<dyn VectorStore>); 5] {
        [
            ("experiences", &self.experiences),
            ("lessons", &self.lessons),
            ("strategies", &self.strategies),
            ("facts", &self.facts),
            ("errors", &self.errors),
        ]
    }
}
