//! SQLite metadata sink
//!
//! Stores one row per page URL with the record as JSON text. Saving a page
//! again replaces its metadata and sets `updated_at`.

use crate::extract::MetadataRecord;
use crate::sink::traits::{is_valid_identifier, MetadataSink, SaveOptions, SinkError, SinkResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default table for saved metadata
pub const DEFAULT_TABLE: &str = "crawled_metadata";

/// SQLite-backed metadata sink
pub struct SqliteSink {
    path: PathBuf,
    default_table: String,
    conn: Mutex<Option<Connection>>,
}

impl SqliteSink {
    /// Creates a sink for the database at `path`; nothing is opened until
    /// [`MetadataSink::connect`]
    pub fn new(path: impl Into<PathBuf>, default_table: Option<String>) -> SinkResult<Self> {
        let default_table = default_table.unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if !is_valid_identifier(&default_table) {
            return Err(SinkError::InvalidTable(default_table));
        }

        Ok(Self {
            path: path.into(),
            default_table,
            conn: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows in `table`
    pub fn count(&self, table: &str) -> SinkResult<u64> {
        let conn = self.conn.lock().unwrap();
        let conn = conn.as_ref().ok_or(SinkError::NotConnected)?;
        let table = checked_table(table)?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    /// Stored metadata JSON for `url`
    pub fn metadata_for(&self, table: &str, url: &str) -> SinkResult<Option<serde_json::Value>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock().unwrap();
        let conn = conn.as_ref().ok_or(SinkError::NotConnected)?;
        let table = checked_table(table)?;
        let metadata: Option<String> = conn
            .query_row(
                &format!("SELECT metadata FROM {} WHERE url = ?1", table),
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        metadata
            .map(|json| serde_json::from_str(&json).map_err(SinkError::from))
            .transpose()
    }
}

fn checked_table(table: &str) -> SinkResult<&str> {
    if is_valid_identifier(table) {
        Ok(table)
    } else {
        Err(SinkError::InvalidTable(table.to_string()))
    }
}

fn ensure_table(conn: &Connection, table: &str) -> SinkResult<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            record_id TEXT,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT
        );
        ",
        table = table
    ))?;
    Ok(())
}

#[async_trait]
impl MetadataSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> SinkResult<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        ensure_table(&conn, &self.default_table)?;

        *self.conn.lock().unwrap() = Some(conn);
        tracing::info!(path = %self.path.display(), table = %self.default_table, "Connected to SQLite sink");
        Ok(())
    }

    async fn disconnect(&self) -> SinkResult<()> {
        let conn = self.conn.lock().unwrap().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| SinkError::Sqlite(e))?;
            tracing::info!(path = %self.path.display(), "Disconnected from SQLite sink");
        }
        Ok(())
    }

    async fn save_metadata(&self, record: &MetadataRecord, options: &SaveOptions) -> SinkResult<()> {
        let table = checked_table(options.table.as_deref().unwrap_or(&self.default_table))?;
        let url = options
            .url
            .as_deref()
            .or_else(|| record.url())
            .ok_or(SinkError::MissingUrl)?;
        let metadata = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        let mut guard = self.conn.lock().unwrap();
        let conn = guard.as_mut().ok_or(SinkError::NotConnected)?;

        ensure_table(conn, table)?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO {} (url, record_id, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(url) DO UPDATE SET
                    record_id = excluded.record_id,
                    metadata = excluded.metadata,
                    updated_at = excluded.created_at",
                table
            ),
            params![url, options.id, metadata, now],
        )?;
        tx.commit()?;

        tracing::debug!(url = %url, table = %table, "Saved metadata to SQLite sink");
        Ok(())
    }
}
