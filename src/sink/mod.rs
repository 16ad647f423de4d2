//! Metadata sinks
//!
//! A sink receives every saved metadata record after its files are written.
//! The backend is chosen by the `[sink]` section of the settings file; the
//! crawler only sees `Arc<dyn MetadataSink>`.

mod document;
mod sqlite;
mod traits;

pub use document::{DocumentSink, MetadataDocument, DEFAULT_COLLECTION};
pub use sqlite::{SqliteSink, DEFAULT_TABLE};
pub use traits::{is_valid_identifier, MetadataSink, SaveOptions, SinkError, SinkResult};

use crate::config::{SinkConfig, SinkKind};
use std::path::Path;
use std::sync::Arc;

/// Builds the configured sink; `None` when sinks are disabled
///
/// Relative sink paths are resolved against `collection_dir`.
pub fn create_sink(
    config: &SinkConfig,
    collection_dir: &Path,
) -> SinkResult<Option<Arc<dyn MetadataSink>>> {
    let table = config.table.clone();
    let path = |default: &str| collection_dir.join(config.path.as_deref().unwrap_or(Path::new(default)));

    let sink: Arc<dyn MetadataSink> = match config.kind {
        SinkKind::None => return Ok(None),
        SinkKind::Sqlite => Arc::new(SqliteSink::new(path("metadata.db"), table)?),
        SinkKind::Document => Arc::new(DocumentSink::new(path("documents"), table)?),
    };

    Ok(Some(sink))
}
