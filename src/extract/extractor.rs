use crate::driver::PageDriver;
use crate::extract::{
    extract_fields, record_id, run_extraction_program, ExtractResult, MetadataRecord, URL_FIELD,
};
use crate::sink::{MetadataSink, SaveOptions};
use crate::task::MetadataExtractionRule;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Extracts page metadata and persists it
///
/// Each non-empty record is written to `<jsons_dir>/<id>.json` with the page
/// HTML in `<htmls_dir>/<id>.html`, then forwarded to the sink.
pub struct Extractor {
    jsons_dir: PathBuf,
    htmls_dir: PathBuf,
    sink: Option<Arc<dyn MetadataSink>>,
    table: Option<String>,
    program_timeout: Duration,
}

impl Extractor {
    pub fn new(jsons_dir: impl Into<PathBuf>, htmls_dir: impl Into<PathBuf>) -> Self {
        Self {
            jsons_dir: jsons_dir.into(),
            htmls_dir: htmls_dir.into(),
            sink: None,
            table: None,
            program_timeout: super::PROGRAM_TIMEOUT,
        }
    }

    /// Forwards saved records to `sink`, into `table` when given
    pub fn with_sink(mut self, sink: Arc<dyn MetadataSink>, table: Option<String>) -> Self {
        self.sink = Some(sink);
        self.table = table;
        self
    }

    pub fn with_program_timeout(mut self, timeout: Duration) -> Self {
        self.program_timeout = timeout;
        self
    }

    /// Builds the record for the current page without saving it
    pub async fn extract_record(
        &self,
        driver: &dyn PageDriver,
        rule: &MetadataExtractionRule,
        url: &str,
        html: &str,
    ) -> MetadataRecord {
        let mut record = match &rule.js_extraction_path {
            Some(program) => {
                match run_extraction_program(program, url, html, self.program_timeout).await {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::error!(url = %url, program = %program.display(), error = %e, "Extraction program failed");
                        MetadataRecord::new()
                    }
                }
            }
            None => extract_fields(driver, &rule.fields).await,
        };

        record.insert(URL_FIELD, url);
        record
    }

    /// Extracts and saves the current page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(id))` - Record saved under `id`
    /// * `Ok(None)` - Nothing extracted, nothing written
    /// * `Err(ExtractError)` - The page or an output file could not be accessed
    pub async fn extract(
        &self,
        driver: &dyn PageDriver,
        rule: &MetadataExtractionRule,
        url: &str,
    ) -> ExtractResult<Option<String>> {
        let html = driver.content().await?;
        let record = self.extract_record(driver, rule, url, &html).await;

        if record.is_empty() {
            tracing::info!(url = %url, "Skipping extraction, no metadata found");
            return Ok(None);
        }

        let id = record_id(url);

        let json_path = self.jsons_dir.join(format!("{}.json", id));
        tokio::fs::write(&json_path, serde_json::to_string_pretty(&record)?).await?;
        tracing::info!(url = %url, path = %json_path.display(), "Saved metadata");

        let html_path = self.htmls_dir.join(format!("{}.html", id));
        tokio::fs::write(&html_path, &html).await?;
        tracing::debug!(url = %url, path = %html_path.display(), "Saved page HTML");

        if let Some(sink) = &self.sink {
            let options = SaveOptions {
                table: self.table.clone(),
                url: Some(url.to_string()),
                id: Some(id.clone()),
            };
            if let Err(e) = sink.save_metadata(&record, &options).await {
                tracing::error!(url = %url, sink = sink.name(), error = %e, "Failed to save metadata to sink");
            }
        }

        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FakeDriver;
    use crate::sink::SinkResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const PAGE: &str = r#"<html><body><h1>Example</h1><span class="price">12</span></body></html>"#;

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<(MetadataRecord, SaveOptions)>>,
        fail: bool,
    }

    #[async_trait]
    impl MetadataSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn connect(&self) -> SinkResult<()> {
            Ok(())
        }

        async fn disconnect(&self) -> SinkResult<()> {
            Ok(())
        }

        async fn save_metadata(&self, record: &MetadataRecord, options: &SaveOptions) -> SinkResult<()> {
            if self.fail {
                return Err(crate::sink::SinkError::NotConnected);
            }
            self.saved
                .lock()
                .unwrap()
                .push((record.clone(), options.clone()));
            Ok(())
        }
    }

    fn rule(json: &str) -> MetadataExtractionRule {
        serde_json::from_str(json).unwrap()
    }

    fn extractor(dir: &TempDir) -> Extractor {
        let jsons = dir.path().join("jsons");
        let htmls = dir.path().join("htmls");
        std::fs::create_dir_all(&jsons).unwrap();
        std::fs::create_dir_all(&htmls).unwrap();
        Extractor::new(jsons, htmls)
    }

    #[tokio::test]
    async fn test_extract_writes_json_and_html() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let extractor = extractor(&dir).with_sink(sink.clone(), Some("books".to_string()));
        let driver = FakeDriver::new("https://a.test/book/1", PAGE);
        let rule = rule(r#"{ "url_pattern": "book", "fields": { "title": { "selector": "h1" } } }"#);

        let id = extractor
            .extract(&driver, &rule, "https://a.test/book/1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(id, record_id("https://a.test/book/1"));

        let json = std::fs::read_to_string(dir.path().join("jsons").join(format!("{}.json", id))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Example");
        assert_eq!(value["url"], "https://a.test/book/1");

        let html = std::fs::read_to_string(dir.path().join("htmls").join(format!("{}.html", id))).unwrap();
        assert!(html.contains("<h1>Example</h1>"));

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.table.as_deref(), Some("books"));
        assert_eq!(saved[0].1.id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_empty_record_is_skipped() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir);
        let driver = FakeDriver::new("https://a.test/book/1", PAGE);
        let rule = rule(r#"{ "url_pattern": "book", "fields": { "isbn": { "selector": ".isbn" } } }"#);

        let id = extractor
            .extract(&driver, &rule, "https://a.test/book/1")
            .await
            .unwrap();

        assert!(id.is_none());
        assert_eq!(std::fs::read_dir(dir.path().join("jsons")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("htmls")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let extractor = extractor(&dir).with_sink(sink, None);
        let driver = FakeDriver::new("https://a.test/book/1", PAGE);
        let rule = rule(r#"{ "url_pattern": "book", "fields": { "price": { "selector": ".price" } } }"#);

        let id = extractor
            .extract(&driver, &rule, "https://a.test/book/1")
            .await
            .unwrap();

        assert!(id.is_some());
    }

    #[tokio::test]
    async fn test_failing_program_gives_empty_record() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir);
        let driver = FakeDriver::new("https://a.test/book/1", PAGE);
        let rule = rule(
            r#"{ "url_pattern": "book", "js_extraction_path": "/nonexistent/extract", "fields": { "title": { "selector": "h1" } } }"#,
        );

        let record = extractor
            .extract_record(&driver, &rule, "https://a.test/book/1", PAGE)
            .await;

        assert!(record.is_empty());
        assert_eq!(record.url(), Some("https://a.test/book/1"));
    }
}
