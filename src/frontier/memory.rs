//! In-memory frontier implementation
//!
//! Keeps the queue as a stack (newest URL first) and writes a JSON snapshot
//! on `persist`. Loading a snapshot restores every queued, visited and failed
//! URL; entries that were `Processing` when the snapshot was taken go back
//! onto the stack.

use crate::frontier::traits::{Frontier, FrontierError, FrontierResult};
use crate::frontier::{EntryStatus, FrontierEntry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serialized form of a [`MemoryFrontier`]
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierSnapshot {
    pub visited: Vec<String>,
    /// Queued URLs, bottom of the stack first
    pub stack: Vec<String>,
    pub failed: Vec<String>,
    /// Retry counts for entries that failed at least once
    #[serde(default)]
    pub retries: BTreeMap<String, u32>,
}

/// Stack-ordered frontier kept in process memory
pub struct MemoryFrontier {
    collection: String,
    entries: HashMap<String, FrontierEntry>,
    stack: Vec<String>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryFrontier {
    /// Creates an empty frontier that never touches disk
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            entries: HashMap::new(),
            stack: Vec::new(),
            snapshot_path: None,
        }
    }

    /// Creates a frontier persisted to `path`, restoring it if the file exists
    pub fn open(path: &Path, collection: &str) -> FrontierResult<Self> {
        let mut frontier = Self::new(collection);
        frontier.snapshot_path = Some(path.to_path_buf());

        if path.exists() {
            frontier.load_state(path)?;
            tracing::info!(
                path = %path.display(),
                queued = frontier.stack.len(),
                "Restored frontier snapshot"
            );
        }

        Ok(frontier)
    }

    /// Captures the current state
    pub fn snapshot(&self) -> FrontierSnapshot {
        let mut snapshot = FrontierSnapshot {
            stack: self.stack.clone(),
            ..Default::default()
        };

        let mut entries: Vec<&FrontierEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.url.cmp(&b.url)));

        for entry in entries {
            match entry.status {
                EntryStatus::Visited => snapshot.visited.push(entry.url.clone()),
                EntryStatus::Failed => snapshot.failed.push(entry.url.clone()),
                EntryStatus::Processing => snapshot.stack.push(entry.url.clone()),
                EntryStatus::Queued => {}
            }
            if entry.retries > 0 {
                snapshot.retries.insert(entry.url.clone(), entry.retries);
            }
        }

        snapshot
    }

    /// Writes the current state as JSON to `path`
    pub fn save_state(&self, path: &Path) -> FrontierResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replaces the current state with the snapshot stored at `path`
    pub fn load_state(&mut self, path: &Path) -> FrontierResult<()> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: FrontierSnapshot = serde_json::from_str(&contents)?;
        self.restore(snapshot);
        Ok(())
    }

    fn restore(&mut self, snapshot: FrontierSnapshot) {
        self.entries.clear();
        self.stack.clear();

        let groups = [
            (snapshot.visited, EntryStatus::Visited),
            (snapshot.failed, EntryStatus::Failed),
            (snapshot.stack, EntryStatus::Queued),
        ];

        // Strictly increasing timestamps keep each list's order on the next snapshot
        let base = Utc::now();
        let mut position = 0i64;

        for (urls, status) in groups {
            for url in urls {
                if self.entries.contains_key(&url) {
                    continue;
                }
                let retries = snapshot.retries.get(&url).copied().unwrap_or(0);
                let mut entry = self.new_entry(&url);
                entry.status = status;
                entry.retries = retries;
                entry.added_at = base + chrono::Duration::microseconds(position);
                position += 1;
                if status == EntryStatus::Queued {
                    self.stack.push(url.clone());
                }
                self.entries.insert(url, entry);
            }
        }
    }

    fn new_entry(&self, url: &str) -> FrontierEntry {
        FrontierEntry {
            url: url.to_string(),
            collection: self.collection.clone(),
            status: EntryStatus::Queued,
            added_at: Utc::now(),
            processing_started_at: None,
            retries: 0,
        }
    }

    fn reclaim_stalled(&mut self, stall_timeout: Duration) {
        let now = Utc::now();
        let timeout = chrono::Duration::milliseconds(stall_timeout.as_millis() as i64);

        for entry in self.entries.values_mut() {
            let stalled = entry.status == EntryStatus::Processing
                && entry
                    .processing_started_at
                    .map(|started| now - started >= timeout)
                    .unwrap_or(true);

            if stalled {
                tracing::warn!(url = %entry.url, "Reclaiming stalled frontier entry");
                entry.status = EntryStatus::Queued;
                entry.retries += 1;
                entry.processing_started_at = None;
                self.stack.insert(0, entry.url.clone());
            }
        }
    }
}

impl Frontier for MemoryFrontier {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn add_urls(&mut self, urls: &[String]) -> FrontierResult<usize> {
        let mut inserted = 0;
        for url in urls {
            if self.entries.contains_key(url) {
                continue;
            }
            let entry = self.new_entry(url);
            self.entries.insert(url.clone(), entry);
            self.stack.push(url.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    fn get_next_url(&mut self, stall_timeout: Duration) -> FrontierResult<Option<String>> {
        self.reclaim_stalled(stall_timeout);

        while let Some(url) = self.stack.pop() {
            if let Some(entry) = self.entries.get_mut(&url) {
                if entry.status == EntryStatus::Queued {
                    entry.status = EntryStatus::Processing;
                    entry.processing_started_at = Some(Utc::now());
                    return Ok(Some(url));
                }
            }
        }

        Ok(None)
    }

    fn mark_completed(&mut self, url: &str) -> FrontierResult<()> {
        let entry = self
            .entries
            .get_mut(url)
            .ok_or_else(|| FrontierError::UnknownUrl(url.to_string()))?;

        if entry.status != EntryStatus::Processing {
            return Err(FrontierError::InvalidTransition {
                url: url.to_string(),
                from: entry.status,
                to: EntryStatus::Visited,
            });
        }

        entry.status = EntryStatus::Visited;
        entry.processing_started_at = None;
        Ok(())
    }

    fn mark_failed(&mut self, url: &str, max_retries: u32) -> FrontierResult<EntryStatus> {
        let entry = self
            .entries
            .get_mut(url)
            .ok_or_else(|| FrontierError::UnknownUrl(url.to_string()))?;

        if entry.status.is_terminal() {
            return Err(FrontierError::InvalidTransition {
                url: url.to_string(),
                from: entry.status,
                to: EntryStatus::Failed,
            });
        }

        let was_queued = entry.status == EntryStatus::Queued;
        entry.retries += 1;
        entry.processing_started_at = None;

        if entry.retries >= max_retries {
            entry.status = EntryStatus::Failed;
            self.stack.retain(|queued| queued != url);
        } else {
            entry.status = EntryStatus::Queued;
            if !was_queued {
                self.stack.insert(0, url.to_string());
            }
        }

        Ok(entry.status)
    }

    fn has_more_urls(&self) -> FrontierResult<bool> {
        Ok(self
            .entries
            .values()
            .any(|entry| entry.status == EntryStatus::Queued))
    }

    fn clear_collection(&mut self) -> FrontierResult<()> {
        self.entries.clear();
        self.stack.clear();
        if let Some(path) = &self.snapshot_path {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn entry(&self, url: &str) -> FrontierResult<Option<FrontierEntry>> {
        Ok(self.entries.get(url).cloned())
    }

    fn count_by_status(&self, status: EntryStatus) -> FrontierResult<u64> {
        Ok(self
            .entries
            .values()
            .filter(|entry| entry.status == status)
            .count() as u64)
    }

    fn persist(&mut self) -> FrontierResult<()> {
        match &self.snapshot_path {
            Some(path) => self.save_state(path),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LONG: Duration = Duration::from_secs(3600);

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_stack_order() {
        let mut frontier = MemoryFrontier::new("books");
        frontier
            .add_urls(&urls(&["https://a.test/1", "https://a.test/2"]))
            .unwrap();

        assert_eq!(
            frontier.get_next_url(LONG).unwrap().as_deref(),
            Some("https://a.test/2")
        );
        assert_eq!(
            frontier.get_next_url(LONG).unwrap().as_deref(),
            Some("https://a.test/1")
        );
        assert_eq!(frontier.get_next_url(LONG).unwrap(), None);
    }

    #[test]
    fn test_duplicates_ignored() {
        let mut frontier = MemoryFrontier::new("books");
        frontier.add_urls(&urls(&["https://a.test/1"])).unwrap();
        let url = frontier.get_next_url(LONG).unwrap().unwrap();
        frontier.mark_completed(&url).unwrap();

        let inserted = frontier.add_urls(&urls(&["https://a.test/1"])).unwrap();

        assert_eq!(inserted, 0);
        assert!(!frontier.has_more_urls().unwrap());
    }

    #[test]
    fn test_failed_url_goes_to_bottom() {
        let mut frontier = MemoryFrontier::new("books");
        frontier
            .add_urls(&urls(&["https://a.test/1", "https://a.test/2"]))
            .unwrap();

        let first = frontier.get_next_url(LONG).unwrap().unwrap();
        assert_eq!(frontier.mark_failed(&first, 3).unwrap(), EntryStatus::Queued);

        assert_eq!(
            frontier.get_next_url(LONG).unwrap().as_deref(),
            Some("https://a.test/1")
        );
        assert_eq!(frontier.get_next_url(LONG).unwrap().as_deref(), Some(first.as_str()));
    }

    #[test]
    fn test_mark_failed_exhausts_retries() {
        let mut frontier = MemoryFrontier::new("books");
        frontier.add_urls(&urls(&["https://a.test/1"])).unwrap();

        let url = frontier.get_next_url(LONG).unwrap().unwrap();
        assert_eq!(frontier.mark_failed(&url, 1).unwrap(), EntryStatus::Failed);
        assert!(!frontier.has_more_urls().unwrap());
        assert!(frontier.mark_failed(&url, 1).is_err());
    }

    #[test]
    fn test_stalled_entry_reclaimed() {
        let mut frontier = MemoryFrontier::new("books");
        frontier.add_urls(&urls(&["https://a.test/1"])).unwrap();
        let url = frontier.get_next_url(LONG).unwrap().unwrap();

        let reclaimed = frontier.get_next_url(Duration::ZERO).unwrap();

        assert_eq!(reclaimed.as_deref(), Some(url.as_str()));
        assert_eq!(frontier.entry(&url).unwrap().unwrap().retries, 1);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frontier_state.json");

        let mut frontier = MemoryFrontier::open(&path, "books").unwrap();
        frontier
            .add_urls(&urls(&[
                "https://a.test/z",
                "https://a.test/c",
                "https://a.test/x",
                "https://a.test/a",
                "https://a.test/m",
                "https://a.test/b",
            ]))
            .unwrap();
        let done = frontier.get_next_url(LONG).unwrap().unwrap();
        frontier.mark_completed(&done).unwrap();
        let done = frontier.get_next_url(LONG).unwrap().unwrap();
        frontier.mark_completed(&done).unwrap();
        let failed = frontier.get_next_url(LONG).unwrap().unwrap();
        frontier.mark_failed(&failed, 1).unwrap();
        let retried = frontier.get_next_url(LONG).unwrap().unwrap();
        frontier.mark_failed(&retried, 3).unwrap();
        frontier.persist().unwrap();
        let before = frontier.snapshot();
        drop(frontier);

        let restored = MemoryFrontier::open(&path, "books").unwrap();
        let after = restored.snapshot();

        assert_eq!(after, before);
        assert_eq!(after.visited.len(), 2);
        assert_eq!(after.failed, vec![failed]);
        assert_eq!(after.retries.get(&retried), Some(&1));

        // Saving the restored state reproduces the same snapshot again
        restored.save_state(&path).unwrap();
        let mut reloaded = MemoryFrontier::new("books");
        reloaded.load_state(&path).unwrap();
        assert_eq!(reloaded.snapshot(), before);
    }

    #[test]
    fn test_processing_entries_saved_as_queued() {
        let mut frontier = MemoryFrontier::new("books");
        frontier.add_urls(&urls(&["https://a.test/1"])).unwrap();
        frontier.get_next_url(LONG).unwrap();

        let snapshot = frontier.snapshot();

        assert_eq!(snapshot.stack, vec!["https://a.test/1".to_string()]);
    }
}
