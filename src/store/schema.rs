//! Database schema for the SQLite frontier store

/// SQL schema for the frontier tables
pub const SCHEMA_SQL: &str = r#"
-- Every URL ever admitted, per job key
CREATE TABLE IF NOT EXISTS frontier_set (
    key TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (key, member)
) WITHOUT ROWID;

-- Pending work, popped in insertion order
CREATE TABLE IF NOT EXISTS frontier_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_frontier_queue_key ON frontier_queue(key, id);
"#;

/// Initializes the frontier schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
