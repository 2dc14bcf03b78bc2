//! SQLite-based result output
//!
//! Records every page the parser saves. The table is created by the
//! preparation hook, so an output handle doubles as the engine's
//! [`Preparer`].

use crate::crawler::{ParsedPage, Preparer};
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS crawled_pages (
    url TEXT PRIMARY KEY,
    title TEXT,
    links_found INTEGER NOT NULL,
    saved_at TEXT NOT NULL
);
"#;

/// SQLite output handler
pub struct SqliteOutput {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOutput {
    /// Opens the results database at `path`
    pub fn open(path: &Path) -> CrawlResult<Self> {
        let conn = Connection::open(path).map_err(storage_error)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(storage_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory results database
    pub fn open_in_memory() -> CrawlResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Records a parsed page, replacing any earlier record for the same URL
    pub async fn record_page(&self, page: &ParsedPage) -> CrawlResult<()> {
        let url = page.url.clone();
        let title = page.title.clone();
        let links_found = page.links.len() as i64;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO crawled_pages (url, title, links_found, saved_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![url, title, links_found, Utc::now().to_rfc3339()],
            )
            .map_err(|e| CrawlError::Save {
                url,
                message: e.to_string(),
            })?;
            Ok(())
        })
        .await
    }

    /// Counts recorded pages
    pub async fn count_pages(&self) -> CrawlResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM crawled_pages", [], |row| row.get(0))
                .map_err(storage_error)?;
            Ok(count as u64)
        })
        .await
    }

    async fn with_conn<T, F>(&self, op: F) -> CrawlResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> CrawlResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| CrawlError::Other(format!("Failed to lock output database: {}", e)))?;
            op(&guard)
        })
        .await
        .map_err(|e| CrawlError::Other(format!("Output task failed: {}", e)))?
    }
}

#[async_trait]
impl Preparer for SqliteOutput {
    async fn prepare_for_crawl(&self) -> CrawlResult<()> {
        self.with_conn(|conn| conn.execute_batch(SCHEMA_SQL).map_err(storage_error))
            .await
    }
}

fn storage_error(e: rusqlite::Error) -> CrawlError {
    CrawlError::Other(format!("Output database error: {}", e))
}
