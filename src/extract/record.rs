use serde::Serialize;
use std::collections::BTreeMap;

/// Field name holding the page URL in every saved record
pub const URL_FIELD: &str = "url";

/// Metadata extracted from one page, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    fields: BTreeMap<String, String>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.get(URL_FIELD)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// True when no field apart from `url` carries a value
    pub fn is_empty(&self) -> bool {
        self.fields
            .iter()
            .all(|(name, value)| name == URL_FIELD || value.is_empty())
    }

    /// Builds a record from a JSON object, flattening non-string values
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = object
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (name, value)
            })
            .collect();
        Self { fields }
    }
}

/// Content-addressed id of a page: MD5 hex of the URI-component-encoded URL
///
/// Names the page's `.json` and `.html` artifacts and joins them with the
/// sink's documents.
///
/// ```
/// use rulecrawl::extract::record_id;
///
/// assert_eq!(record_id("https://example.com/"), "c8e1129b1e1090f15805d88a7aa22ebd");
/// ```
pub fn record_id(url: &str) -> String {
    format!("{:x}", md5::compute(encode_uri_component(url)))
}

/// Percent-encodes everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
fn encode_uri_component(input: &str) -> String {
    urlencoding::encode(input)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}
