//! Database schema definitions for the durable frontier

/// SQL schema for the frontier database
///
/// Timestamps are stored as milliseconds since the Unix epoch so that the
/// stall check and FIFO ordering are plain integer comparisons.
pub const SCHEMA_SQL: &str = r#"
-- One row per (url, collection)
CREATE TABLE IF NOT EXISTS frontier_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    collection TEXT NOT NULL,
    status TEXT NOT NULL,
    added_at INTEGER NOT NULL,
    processing_started_at INTEGER,
    retries INTEGER NOT NULL DEFAULT 0,
    UNIQUE(url, collection)
);

CREATE INDEX IF NOT EXISTS idx_frontier_claim
    ON frontier_entries(collection, status, added_at);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
