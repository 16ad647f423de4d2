//! Selector-based field extraction

use crate::driver::{PageDriver, ValueSource};
use crate::extract::MetadataRecord;
use crate::task::MetadataField;
use std::collections::BTreeMap;

/// Extracts every field from the current page
///
/// Fields that cannot be read come back as empty strings.
pub async fn extract_fields(
    driver: &dyn PageDriver,
    fields: &BTreeMap<String, MetadataField>,
) -> MetadataRecord {
    let mut record = MetadataRecord::new();
    for (name, field) in fields {
        let value = extract_field(driver, name, field).await;
        record.insert(name.clone(), value);
    }
    record
}

/// Reads one field, trying its selectors in order until one yields a value
pub async fn extract_field(driver: &dyn PageDriver, name: &str, field: &MetadataField) -> String {
    let source = ValueSource::Property(field.property.clone());

    for selector in field.selector.as_slice() {
        let values = match driver.element_values(selector, &source).await {
            Ok(values) => values,
            Err(e) => {
                tracing::debug!(field = %name, selector = %selector, error = %e, "Selector failed");
                continue;
            }
        };

        let mut values = values
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty());

        let value = if field.collect_all {
            values.collect::<Vec<_>>().join(&field.delimiter)
        } else {
            values.next().unwrap_or_default().to_string()
        };

        if !value.is_empty() {
            return value;
        }
    }

    String::new()
}
