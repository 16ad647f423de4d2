use crate::task::TaskConfig;
use crate::TaskError;
use scraper::Selector;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, resolves and validates a task file
///
/// # Arguments
///
/// * `path` - Path to the JSON task file
///
/// # Returns
///
/// * `Ok(TaskConfig)` - The task with every pattern compiled
/// * `Err(TaskError)` - The file is missing, malformed or fails validation
pub fn load_task(path: &Path) -> Result<TaskConfig, TaskError> {
    let content = std::fs::read_to_string(path).map_err(|source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut task: TaskConfig = serde_json::from_str(&content)?;

    // Extraction programs are referenced relative to the task file
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for rule in &mut task.metadata_extraction {
        if let Some(program) = &rule.js_extraction_path {
            if program.is_relative() {
                rule.js_extraction_path = Some(base_dir.join(program));
            }
        }
    }

    validate_task(&task)?;

    Ok(task)
}

/// Computes a SHA-256 hash of the task file content
pub fn compute_task_hash(path: &Path) -> Result<String, TaskError> {
    let content = std::fs::read(path).map_err(|source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a task and returns it together with its hash
pub fn load_task_with_hash(path: &Path) -> Result<(TaskConfig, String), TaskError> {
    let task = load_task(path)?;
    let hash = compute_task_hash(path)?;
    Ok((task, hash))
}

/// Checks the structural rules serde cannot express
pub fn validate_task(task: &TaskConfig) -> Result<(), TaskError> {
    if task.crawl_rules.is_empty() {
        return Err(TaskError::Validation(
            "task must contain at least one crawl rule".to_string(),
        ));
    }

    for rule in &task.crawl_rules {
        for destination in &rule.to {
            if let Some(selector) = &destination.selector {
                if Selector::parse(selector).is_err() {
                    return Err(TaskError::Validation(format!(
                        "link selector '{}' in crawl rule '{}' is not valid CSS",
                        selector, rule.from
                    )));
                }
            }
        }
    }

    for rule in &task.metadata_extraction {
        if rule.fields.is_empty() && rule.js_extraction_path.is_none() {
            return Err(TaskError::Validation(format!(
                "metadata rule '{}' has neither fields nor an extraction program",
                rule.url_pattern
            )));
        }

        for (name, field) in &rule.fields {
            let selectors = field.selector.as_slice();
            if selectors.is_empty() || selectors.iter().any(|s| s.trim().is_empty()) {
                return Err(TaskError::Validation(format!(
                    "field '{}' in metadata rule '{}' needs a non-empty selector",
                    name, rule.url_pattern
                )));
            }
        }
    }

    for interaction in &task.interaction_rules {
        for rule in &interaction.rules {
            if rule.actions.is_empty() {
                return Err(TaskError::Validation(format!(
                    "interaction rule '{}' under '{}' has no actions",
                    rule.display_name(),
                    interaction.url_pattern
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_task(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("task.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_valid_task() {
        let dir = TempDir::new().unwrap();
        let path = write_task(
            &dir,
            r#"{
                "crawl_rules": [{ "from": "example", "to": [{ "pattern": "/book/" }] }],
                "metadata_extraction": [{ "url_pattern": "/book/", "fields": { "title": { "selector": "h1" } } }]
            }"#,
        );

        let task = load_task(&path).unwrap();
        assert_eq!(task.crawl_rules.len(), 1);
        assert_eq!(task.metadata_extraction.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let result = load_task(Path::new("/nonexistent/task.json"));
        assert!(matches!(result, Err(TaskError::Io { .. })));
    }

    #[test]
    fn test_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ \"crawl_rules\": [").unwrap();

        let result = load_task(file.path());
        assert!(matches!(result, Err(TaskError::Parse(_))));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_task(&dir, r#"{ "crawl_rules": [{ "from": "([a-z" }] }"#);

        let result = load_task(&path);
        assert!(matches!(result, Err(TaskError::Parse(_))));
    }

    #[test]
    fn test_no_crawl_rules() {
        let dir = TempDir::new().unwrap();
        let path = write_task(&dir, r#"{ "metadata_extraction": [] }"#);

        let result = load_task(&path);
        assert!(matches!(result, Err(TaskError::Validation(_))));
    }

    #[test]
    fn test_invalid_link_selector_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_task(
            &dir,
            r#"{ "crawl_rules": [{ "from": "shop", "to": [{ "pattern": "/book/", "selector": "div[" }] }] }"#,
        );

        let result = load_task(&path);
        assert!(matches!(result, Err(TaskError::Validation(_))));
    }

    #[test]
    fn test_metadata_rule_without_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_task(
            &dir,
            r#"{
                "crawl_rules": [{ "from": ".*" }],
                "metadata_extraction": [{ "url_pattern": ".*" }]
            }"#,
        );

        let result = load_task(&path);
        assert!(matches!(result, Err(TaskError::Validation(_))));
    }

    #[test]
    fn test_extraction_program_resolved_against_task_dir() {
        let dir = TempDir::new().unwrap();
        let path = write_task(
            &dir,
            r#"{
                "crawl_rules": [{ "from": ".*" }],
                "metadata_extraction": [{ "url_pattern": ".*", "js_extraction_path": "scripts/extract.sh" }]
            }"#,
        );

        let task = load_task(&path).unwrap();
        assert_eq!(
            task.metadata_extraction[0].js_extraction_path.as_deref(),
            Some(dir.path().join("scripts/extract.sh").as_path())
        );
    }

    #[test]
    fn test_task_hash_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = write_task(&dir, r#"{ "crawl_rules": [{ "from": ".*" }] }"#);

        let (_, hash) = load_task_with_hash(&path).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_task_hash(&path).unwrap());
    }
}
