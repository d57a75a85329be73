//! Persistence for the append-only journal (spec §3 "Journal Entry", §6
//! "Persistence layout"). The engine itself is in-memory; a `Store`
//! periodically (or synchronously, per entry) durably records the journal so
//! it can be replayed to rebuild state after a restart.

pub mod memory_store;
pub mod sqlite_store;

use async_trait::async_trait;

use crate::model::journal::JournalEntry;

#[async_trait]
pub trait Store: Send + Sync {
    async fn append(&self, entry: &JournalEntry) -> anyhow::Result<()>;

    /// Load every journal entry in ascending `seq` order, for replay on
    /// startup (spec §6 "replay(journal.db)").
    async fn load_all(&self) -> anyhow::Result<Vec<JournalEntry>>;
}

pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
