use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::SnapshotStore;
use crate::time::now_ms;
use crate::{AppError, AppResult};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    snapshot BLOB NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Snapshots kept as rows of a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "open_sqlite_store")
                .with_context("path", path.display().to_string())
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA busy_timeout=5000;")
            .map_err(|err| AppError::from(err).with_context("operation", "sqlite_pragmas"))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|err| AppError::from(err).with_context("operation", "open_sqlite_store"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|err| AppError::from(err).with_context("operation", "sqlite_schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self, collection: &str) -> AppResult<Option<Vec<u8>>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT snapshot FROM collections WHERE name = ?1",
            params![collection],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "load_snapshot")
                .with_context("collection", collection)
        })
    }

    fn save(&self, collection: &str, snapshot: &[u8]) -> AppResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO collections (name, snapshot, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET snapshot = excluded.snapshot, updated_at = excluded.updated_at",
            params![collection, snapshot, now_ms()],
        )
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "save_snapshot")
                .with_context("collection", collection)
        })?;
        Ok(())
    }

    fn collections(&self) -> AppResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn upsert_replaces_snapshot() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.load("events").unwrap(), None);
        store.save("events", b"[1]").unwrap();
        store.save("events", b"[1,2]").unwrap();
        assert_eq!(store.load("events").unwrap(), Some(b"[1,2]".to_vec()));
        assert_eq!(store.collections().unwrap(), vec!["events".to_string()]);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daybook.sqlite3");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save("habits", b"[]").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load("habits").unwrap(), Some(b"[]".to_vec()));
    }
}
