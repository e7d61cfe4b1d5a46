use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::StorageError;

pub const DB_FILE_NAME: &str = "sina.sqlite3";

pub const STUDENTS_KEY: &str = "students";
pub const SUBJECTS_KEY: &str = "subjects";
pub const GRADES_KEY: &str = "grades";

/// Durable key/value storage for whole collections, one serialized JSON
/// array per key.
pub trait CollectionStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes every entry or none of them.
    fn write_all(&mut self, entries: &[(&str, String)]) -> Result<(), StorageError>;
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Early workspaces were created without updated_at. Add and backfill if needed.
    ensure_collections_updated_at(&conn)?;

    Ok(conn)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

fn ensure_collections_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "collections", "updated_at")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE collections ADD COLUMN updated_at TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    conn.execute(
        "UPDATE collections SET updated_at = ? WHERE updated_at = ''",
        [now_rfc3339()],
    )?;
    Ok(())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(open_db(workspace)?))
    }
}

impl CollectionStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM collections WHERE key = ?",
                [key],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_all(&mut self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let updated_at = now_rfc3339();
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO collections(key, value, updated_at) VALUES(?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                (key, value, &updated_at),
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Process-local store used when no workspace is open.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }
}

impl CollectionStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_all(&mut self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }
}
