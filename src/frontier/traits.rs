//! Frontier trait and error types
//!
//! This module defines the interface shared by the durable and in-memory
//! frontier implementations.

use crate::frontier::{EntryStatus, FrontierEntry};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("URL not in frontier: {0}")]
    UnknownUrl(String),

    #[error("Invalid transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: EntryStatus,
        to: EntryStatus,
    },
}

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// The work queue of URLs for one collection
///
/// Every status change goes through these operations; callers never
/// mutate entries directly.
pub trait Frontier: Send {
    /// Name of the collection this frontier serves
    fn collection(&self) -> &str;

    /// Inserts every unknown URL as `Queued`
    ///
    /// Known URLs are left untouched. Returns the number of URLs inserted.
    fn add_urls(&mut self, urls: &[String]) -> FrontierResult<usize>;

    /// Claims the next URL to crawl
    ///
    /// `Processing` entries claimed longer ago than `stall_timeout` are first
    /// returned to `Queued` with one more retry recorded. Returns `None` when
    /// nothing is queued.
    fn get_next_url(&mut self, stall_timeout: Duration) -> FrontierResult<Option<String>>;

    /// Moves a `Processing` URL to `Visited`
    fn mark_completed(&mut self, url: &str) -> FrontierResult<()>;

    /// Records a failed attempt
    ///
    /// The attempt is counted first. Once `retries` reaches `max_retries` the
    /// entry becomes `Failed`, otherwise it is queued again. Returns the new
    /// status.
    fn mark_failed(&mut self, url: &str, max_retries: u32) -> FrontierResult<EntryStatus>;

    /// Returns true if at least one URL is queued
    fn has_more_urls(&self) -> FrontierResult<bool>;

    /// Removes every entry of the collection
    fn clear_collection(&mut self) -> FrontierResult<()>;

    /// Looks up a single entry
    fn entry(&self, url: &str) -> FrontierResult<Option<FrontierEntry>>;

    /// Counts entries in a given status
    fn count_by_status(&self, status: EntryStatus) -> FrontierResult<u64>;

    /// Flushes state that is not written through on every operation
    fn persist(&mut self) -> FrontierResult<()> {
        Ok(())
    }
}
