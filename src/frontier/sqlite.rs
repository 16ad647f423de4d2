//! SQLite frontier implementation
//!
//! Durable frontier backed by a single SQLite file. Entries survive crashes;
//! URLs left in `Processing` by a dead process are reclaimed by the stall
//! check in `get_next_url`.

use crate::frontier::schema::initialize_schema;
use crate::frontier::traits::{Frontier, FrontierError, FrontierResult};
use crate::frontier::{millis_to_datetime, EntryStatus, FrontierEntry};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// SQLite frontier backend
pub struct SqliteFrontier {
    conn: Connection,
    collection: String,
}

impl SqliteFrontier {
    /// Opens (or creates) the frontier database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `collection` - Collection whose entries this instance manages
    pub fn open(path: &Path, collection: &str) -> FrontierResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            collection: collection.to_string(),
        })
    }

    /// Creates an in-memory frontier (for testing)
    #[cfg(test)]
    pub fn open_in_memory(collection: &str) -> FrontierResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            collection: collection.to_string(),
        })
    }

    fn current_status(&self, url: &str) -> FrontierResult<Option<EntryStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM frontier_entries WHERE url = ?1 AND collection = ?2",
                params![url, self.collection],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status.and_then(|s| EntryStatus::from_db_string(&s)))
    }

    fn transition_error(&self, url: &str, to: EntryStatus) -> FrontierError {
        match self.current_status(url) {
            Ok(Some(from)) => FrontierError::InvalidTransition {
                url: url.to_string(),
                from,
                to,
            },
            Ok(None) => FrontierError::UnknownUrl(url.to_string()),
            Err(e) => e,
        }
    }
}

impl Frontier for SqliteFrontier {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_urls(&mut self, urls: &[String]) -> FrontierResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO frontier_entries (url, collection, status, added_at, retries)
                 VALUES (?1, ?2, ?3, ?4, 0)",
            )?;
            for url in urls {
                let now = Utc::now().timestamp_millis();
                inserted += stmt.execute(params![
                    url,
                    self.collection,
                    EntryStatus::Queued.to_db_string(),
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get_next_url(&mut self, stall_timeout: Duration) -> FrontierResult<Option<String>> {
        let now = Utc::now().timestamp_millis();
        let cutoff = now - stall_timeout.as_millis() as i64;

        // Reclaim, select and claim must be one atomic step
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let reclaimed = tx.execute(
            "UPDATE frontier_entries
             SET status = ?1, retries = retries + 1, processing_started_at = NULL
             WHERE collection = ?2 AND status = ?3 AND processing_started_at <= ?4",
            params![
                EntryStatus::Queued.to_db_string(),
                self.collection,
                EntryStatus::Processing.to_db_string(),
                cutoff
            ],
        )?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Reclaimed stalled frontier entries");
        }

        let next: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, url FROM frontier_entries
                 WHERE collection = ?1 AND status = ?2
                 ORDER BY added_at ASC, id ASC LIMIT 1",
                params![self.collection, EntryStatus::Queued.to_db_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((id, _)) = &next {
            tx.execute(
                "UPDATE frontier_entries SET status = ?1, processing_started_at = ?2 WHERE id = ?3",
                params![EntryStatus::Processing.to_db_string(), now, id],
            )?;
        }

        tx.commit()?;
        Ok(next.map(|(_, url)| url))
    }

    fn mark_completed(&mut self, url: &str) -> FrontierResult<()> {
        let updated = self.conn.execute(
            "UPDATE frontier_entries SET status = ?1, processing_started_at = NULL
             WHERE url = ?2 AND collection = ?3 AND status = ?4",
            params![
                EntryStatus::Visited.to_db_string(),
                url,
                self.collection,
                EntryStatus::Processing.to_db_string()
            ],
        )?;

        if updated == 0 {
            return Err(self.transition_error(url, EntryStatus::Visited));
        }
        Ok(())
    }

    fn mark_failed(&mut self, url: &str, max_retries: u32) -> FrontierResult<EntryStatus> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, u32)> = tx
            .query_row(
                "SELECT status, retries FROM frontier_entries WHERE url = ?1 AND collection = ?2",
                params![url, self.collection],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (status, retries) = match current {
            Some((status, retries)) => (
                EntryStatus::from_db_string(&status).unwrap_or(EntryStatus::Queued),
                retries,
            ),
            None => return Err(FrontierError::UnknownUrl(url.to_string())),
        };

        if status.is_terminal() {
            return Err(FrontierError::InvalidTransition {
                url: url.to_string(),
                from: status,
                to: EntryStatus::Failed,
            });
        }

        let retries = retries + 1;
        let next = if retries >= max_retries {
            EntryStatus::Failed
        } else {
            EntryStatus::Queued
        };

        tx.execute(
            "UPDATE frontier_entries SET status = ?1, retries = ?2, processing_started_at = NULL
             WHERE url = ?3 AND collection = ?4",
            params![next.to_db_string(), retries, url, self.collection],
        )?;
        tx.commit()?;

        Ok(next)
    }

    fn has_more_urls(&self) -> FrontierResult<bool> {
        Ok(self.count_by_status(EntryStatus::Queued)? > 0)
    }

    fn clear_collection(&mut self) -> FrontierResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM frontier_entries WHERE collection = ?1",
            params![self.collection],
        )?;
        tracing::info!(collection = %self.collection, removed, "Cleared frontier collection");
        Ok(())
    }

    fn entry(&self, url: &str) -> FrontierResult<Option<FrontierEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT url, collection, status, added_at, processing_started_at, retries
                 FROM frontier_entries WHERE url = ?1 AND collection = ?2",
                params![url, self.collection],
                |row| {
                    let status: String = row.get(2)?;
                    let started: Option<i64> = row.get(4)?;
                    Ok(FrontierEntry {
                        url: row.get(0)?,
                        collection: row.get(1)?,
                        status: EntryStatus::from_db_string(&status)
                            .unwrap_or(EntryStatus::Queued),
                        added_at: millis_to_datetime(row.get(3)?),
                        processing_started_at: started.map(millis_to_datetime),
                        retries: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(entry)
    }

    fn count_by_status(&self, status: EntryStatus) -> FrontierResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frontier_entries WHERE collection = ?1 AND status = ?2",
            params![self.collection, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
