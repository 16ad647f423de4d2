//! Document-store metadata sink
//!
//! Keeps one JSON document per record under `<root>/<collection>/<id>.json`.
//! The document key is the record id, so saving the same page again
//! overwrites its document while keeping the original `created_at`.

use crate::extract::{record_id, MetadataRecord};
use crate::sink::traits::{is_valid_identifier, MetadataSink, SaveOptions, SinkError, SinkResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Default collection for saved metadata
pub const DEFAULT_COLLECTION: &str = "crawled_data";

/// A stored metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(rename = "_key")]
    pub key: String,
    pub url: String,
    pub base_file_name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Filesystem document store
pub struct DocumentSink {
    root: PathBuf,
    default_collection: String,
    connected: AtomicBool,
}

impl DocumentSink {
    pub fn new(root: impl Into<PathBuf>, default_collection: Option<String>) -> SinkResult<Self> {
        let default_collection =
            default_collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        if !is_valid_identifier(&default_collection) {
            return Err(SinkError::InvalidTable(default_collection));
        }

        Ok(Self {
            root: root.into(),
            default_collection,
            connected: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, collection: &str, key: &str) -> PathBuf {
        self.root.join(collection).join(format!("{}.json", key))
    }

    /// Reads the document stored under `key`
    pub async fn get(&self, collection: &str, key: &str) -> SinkResult<Option<MetadataDocument>> {
        let path = self.document_path(collection, key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MetadataSink for DocumentSink {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn connect(&self) -> SinkResult<()> {
        tokio::fs::create_dir_all(self.root.join(&self.default_collection)).await?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(
            root = %self.root.display(),
            collection = %self.default_collection,
            "Connected to document sink"
        );
        Ok(())
    }

    async fn disconnect(&self) -> SinkResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!(root = %self.root.display(), "Disconnected from document sink");
        }
        Ok(())
    }

    async fn save_metadata(&self, record: &MetadataRecord, options: &SaveOptions) -> SinkResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SinkError::NotConnected);
        }

        let collection = options.table.as_deref().unwrap_or(&self.default_collection);
        if !is_valid_identifier(collection) {
            return Err(SinkError::InvalidTable(collection.to_string()));
        }

        let url = options
            .url
            .as_deref()
            .or_else(|| record.url())
            .ok_or(SinkError::MissingUrl)?
            .to_string();
        let key = options.id.clone().unwrap_or_else(|| record_id(&url));

        let now = Utc::now();
        let (created_at, updated_at) = match self.get(collection, &key).await? {
            Some(existing) => (existing.created_at, Some(now)),
            None => (now, None),
        };

        let document = MetadataDocument {
            key: key.clone(),
            url,
            base_file_name: key.clone(),
            metadata: serde_json::to_value(record)?,
            created_at,
            updated_at,
        };

        tokio::fs::create_dir_all(self.root.join(collection)).await?;
        tokio::fs::write(
            self.document_path(collection, &key),
            serde_json::to_string_pretty(&document)?,
        )
        .await?;

        tracing::debug!(key = %key, collection = %collection, "Saved metadata document");
        Ok(())
    }
}
