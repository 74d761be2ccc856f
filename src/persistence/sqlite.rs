//! SQLite-backed key-value store
//!
//! Mirrors the browser build's IndexedDB object store: a single `settings`
//! table whose rows are keyed by `id`. Connection access runs on the blocking
//! thread pool.

use super::{KeyValueStore, PersistenceError, PersistenceResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Key-value store in a SQLite database file
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> PersistenceResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = ?path, "Opened snapshot database");
        Self::init(conn)
    }

    /// Database that lives only as long as this store
    pub fn open_in_memory() -> PersistenceResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> PersistenceResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> PersistenceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> PersistenceResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| PersistenceError::Lock(e.to_string()))?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn put(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        let now = chrono::Utc::now().timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO settings (id, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> PersistenceResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM settings WHERE id = ?1", params![key])?;
            Ok(())
        })
        .await
    }
}
