//! Metadata sink trait and shared types

use crate::extract::MetadataRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to a metadata sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sink is not connected")]
    NotConnected,

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Record has no URL")]
    MissingUrl,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Where and under which keys a record is saved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Table or collection; the sink's default when absent
    pub table: Option<String>,

    /// Page URL; read from the record when absent
    pub url: Option<String>,

    /// Record id shared with the page's output files
    pub id: Option<String>,
}

/// Destination for extracted metadata
///
/// Implementations must be usable from the crawl task and the extractor at
/// the same time, so every method takes `&self`.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Opens the underlying store and prepares the default table
    async fn connect(&self) -> SinkResult<()>;

    /// Releases the underlying store
    async fn disconnect(&self) -> SinkResult<()>;

    /// Inserts `record`, or updates the existing record for the same key
    async fn save_metadata(&self, record: &MetadataRecord, options: &SaveOptions) -> SinkResult<()>;
}

/// Checks that `name` can be used as an unquoted SQL identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
