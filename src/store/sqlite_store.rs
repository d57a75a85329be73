use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::model::journal::JournalEntry;

use super::Store;

/// Durable journal store backed by sqlite, grounded on the teacher's
/// `api::db` connection-and-migration pattern: WAL mode, idempotent
/// `CREATE TABLE IF NOT EXISTS`, a single shared connection behind a
/// `tokio::sync::Mutex`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("creating journal db directory")?;
            }
        }

        let conn = Connection::open(path).with_context(|| format!("opening sqlite journal at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        migrate(&conn)?;

        Ok(SqliteStore { conn: Arc::new(Mutex::new(conn)) })
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS journal (
            seq      INTEGER PRIMARY KEY,
            user_id  TEXT NOT NULL,
            kind     TEXT NOT NULL,
            ts       INTEGER NOT NULL,
            payload  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS journal_user_id_idx ON journal(user_id);
        ",
    )?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let conn = self.conn.lock().await;
        let kind = serde_json::to_string(&entry.kind)?;
        let payload = serde_json::to_string(&entry.payload)?;
        conn.execute(
            "INSERT INTO journal (seq, user_id, kind, ts, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.seq, entry.user_id, kind, entry.ts, payload],
        )?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<JournalEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT seq, user_id, kind, ts, payload FROM journal ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| {
            let seq: u64 = row.get(0)?;
            let user_id: String = row.get(1)?;
            let kind_raw: String = row.get(2)?;
            let ts: u64 = row.get(3)?;
            let payload_raw: String = row.get(4)?;
            Ok((seq, user_id, kind_raw, ts, payload_raw))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (seq, user_id, kind_raw, ts, payload_raw) = row?;
            let kind = serde_json::from_str(&kind_raw).context("decoding journal kind")?;
            let payload = serde_json::from_str(&payload_raw).context("decoding journal payload")?;
            entries.push(JournalEntry { seq, user_id, kind, ts, payload });
        }
        Ok(entries)
    }
}
