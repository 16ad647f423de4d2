//! URL frontier
//!
//! The frontier owns every URL the crawler knows about for a collection and
//! tracks where each one is in its lifecycle. Two backends are provided:
//! a durable SQLite store and a snapshot-backed in-memory store.

mod memory;
mod schema;
mod sqlite;
mod status;
mod traits;

pub use memory::{FrontierSnapshot, MemoryFrontier};
pub use sqlite::SqliteFrontier;
pub use status::EntryStatus;
pub use traits::{Frontier, FrontierError, FrontierResult};

use chrono::{DateTime, TimeZone, Utc};

/// A single URL tracked by the frontier
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub url: String,
    pub collection: String,
    pub status: EntryStatus,
    pub added_at: DateTime<Utc>,
    /// Set while the entry is `Processing`
    pub processing_started_at: Option<DateTime<Utc>>,
    pub retries: u32,
}

pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
