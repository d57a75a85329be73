use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::journal::JournalEntry;

use super::Store;

/// In-memory journal store, for tests and the `simulate` scenario runner
/// where durability is not the point.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn load_all(&self) -> anyhow::Result<Vec<JournalEntry>> {
        Ok(self.entries.lock().await.clone())
    }
}
