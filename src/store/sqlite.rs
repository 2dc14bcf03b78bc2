//! SQLite store implementation
//!
//! This module provides a SQLite-backed implementation of the FrontierStore
//! trait. rusqlite is blocking, so each operation runs on the blocking pool
//! while holding the connection lock.

use crate::store::schema::initialize_schema;
use crate::store::traits::{FrontierStore, StoreError, StoreResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite frontier store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `op` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Backend(format!("Failed to lock connection: {}", e)))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Blocking store task failed: {}", e)))?
    }
}

#[async_trait]
impl FrontierStore for SqliteStore {
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let (key, member) = (key.to_string(), member.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO frontier_set (key, member) VALUES (?1, ?2)",
                params![key, member],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn list_append(&self, key: &str, values: &[String]) -> StoreResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let key = key.to_string();
        let values = values.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO frontier_queue (key, value) VALUES (?1, ?2)")?;
                for value in &values {
                    stmt.execute(params![key, value])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_pop_front(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let head: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, value FROM frontier_queue WHERE key = ?1 ORDER BY id LIMIT 1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let popped = match head {
                Some((id, value)) => {
                    tx.execute("DELETE FROM frontier_queue WHERE id = ?1", params![id])?;
                    Some(value)
                }
                None => None,
            };
            tx.commit()?;
            Ok(popped)
        })
        .await
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM frontier_queue WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn set_len(&self, key: &str) -> StoreResult<u64> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM frontier_set WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM frontier_set WHERE key = ?1", params![key])?;
            tx.execute("DELETE FROM frontier_queue WHERE key = ?1", params![key])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
