use super::{IdentityMapping, IdentityStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS identities (
    platform_sender_id      TEXT PRIMARY KEY,
    backend_conversation_id TEXT NOT NULL,
    created_at              TEXT NOT NULL
);";

/// SQLite-backed identity store. One connection, serialized behind a mutex.
pub struct SqliteIdentityStore {
    conn: Mutex<Connection>,
}

impl SqliteIdentityStore {
    /// Create or open the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create identity database dir {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open identity database {}", path.display()))?;
        conn.execute_batch(&format!("PRAGMA journal_mode=WAL;\n{SCHEMA}"))
            .context("Failed to initialize identities schema")?;

        tracing::info!("Identity store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid identity timestamp '{raw}'"))?
        .with_timezone(&Utc))
}

fn into_mapping((sender, conversation, created_at): (String, String, String)) -> Result<IdentityMapping> {
    Ok(IdentityMapping {
        platform_sender_id: sender,
        backend_conversation_id: conversation,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find(&self, platform_sender_id: &str) -> Result<Option<IdentityMapping>> {
        let row: Option<(String, String, String)> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT platform_sender_id, backend_conversation_id, created_at
                 FROM identities WHERE platform_sender_id = ?1",
                params![platform_sender_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Identity lookup failed")?
        };
        row.map(into_mapping).transpose()
    }

    async fn insert(
        &self,
        platform_sender_id: &str,
        backend_conversation_id: &str,
    ) -> Result<bool> {
        let changed = self
            .conn
            .lock()
            .execute(
                "INSERT OR IGNORE INTO identities
                 (platform_sender_id, backend_conversation_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    platform_sender_id,
                    backend_conversation_id,
                    Utc::now().to_rfc3339()
                ],
            )
            .context("Identity insert failed")?;
        Ok(changed > 0)
    }

    async fn list(&self) -> Result<Vec<IdentityMapping>> {
        let rows: Vec<(String, String, String)> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT platform_sender_id, backend_conversation_id, created_at
                 FROM identities ORDER BY created_at ASC, platform_sender_id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Identity listing failed")?;
            rows
        };
        rows.into_iter().map(into_mapping).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_returns_none_for_unknown_sender() {
        let store = SqliteIdentityStore::in_memory().unwrap();
        assert!(store.find("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = SqliteIdentityStore::in_memory().unwrap();
        assert!(store.insert("psid-1", "abc123").await.unwrap());

        let mapping = store.find("psid-1").await.unwrap().unwrap();
        assert_eq!(mapping.platform_sender_id, "psid-1");
        assert_eq!(mapping.backend_conversation_id, "abc123");
    }

    #[tokio::test]
    async fn existing_mapping_is_never_overwritten() {
        let store = SqliteIdentityStore::in_memory().unwrap();
        assert!(store.insert("psid-1", "first").await.unwrap());
        assert!(!store.insert("psid-1", "second").await.unwrap());

        let mapping = store.find("psid-1").await.unwrap().unwrap();
        assert_eq!(mapping.backend_conversation_id, "first");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_returns_all_mappings() {
        let store = SqliteIdentityStore::in_memory().unwrap();
        store.insert("psid-a", "c1").await.unwrap();
        store.insert("psid-b", "c2").await.unwrap();

        let mut senders: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.platform_sender_id)
            .collect();
        senders.sort();
        assert_eq!(senders, vec!["psid-a", "psid-b"]);
    }

    #[tokio::test]
    async fn mappings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keiko.db");

        {
            let store = SqliteIdentityStore::open(&path).unwrap();
            store.insert("psid-1", "abc123").await.unwrap();
        }

        let store = SqliteIdentityStore::open(&path).unwrap();
        let mapping = store.find("psid-1").await.unwrap().unwrap();
        assert_eq!(mapping.backend_conversation_id, "abc123");
    }
}
