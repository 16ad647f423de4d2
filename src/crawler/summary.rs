//! End-of-run statistics

use crate::frontier::{EntryStatus, Frontier, FrontierResult};
use std::time::Duration;

/// Counters kept while the crawl loop runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// URLs processed successfully in this run
    pub processed: u64,

    /// Processing failures in this run, including ones that will be retried
    pub failures: u64,

    /// Metadata records written in this run
    pub records_saved: u64,

    /// Links newly added to the frontier in this run
    pub links_added: u64,
}

/// Frontier state and run counters for one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    pub collection: String,
    pub queued: u64,
    pub processing: u64,
    pub visited: u64,
    pub failed: u64,
    pub run: RunStats,
    pub duration: Duration,
}

impl CrawlSummary {
    /// Reads the per-status counts from `frontier`
    pub fn from_frontier(frontier: &dyn Frontier) -> FrontierResult<Self> {
        Ok(Self {
            collection: frontier.collection().to_string(),
            queued: frontier.count_by_status(EntryStatus::Queued)?,
            processing: frontier.count_by_status(EntryStatus::Processing)?,
            visited: frontier.count_by_status(EntryStatus::Visited)?,
            failed: frontier.count_by_status(EntryStatus::Failed)?,
            ..Self::default()
        })
    }

    pub fn with_run(mut self, run: RunStats, duration: Duration) -> Self {
        self.run = run;
        self.duration = duration;
        self
    }

    pub fn total_urls(&self) -> u64 {
        self.queued + self.processing + self.visited + self.failed
    }

    /// Share of finished URLs that were visited, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.visited + self.failed;
        if finished == 0 {
            return 0.0;
        }
        (self.visited as f64 / finished as f64) * 100.0
    }

    pub fn log(&self) {
        tracing::info!(
            collection = %self.collection,
            processed = self.run.processed,
            failures = self.run.failures,
            records_saved = self.run.records_saved,
            links_added = self.run.links_added,
            duration = ?self.duration,
            "Crawl finished"
        );
        tracing::info!(
            queued = self.queued,
            processing = self.processing,
            visited = self.visited,
            failed = self.failed,
            "Frontier state"
        );
    }
}

/// Prints frontier statistics for the `stats` command
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Statistics ===\n");

    println!("Collection: {}", summary.collection);
    println!("  Total URLs: {}", summary.total_urls());
    println!();

    println!("URLs by Status:");
    let total = summary.total_urls();
    for (status, count) in [
        (EntryStatus::Queued, summary.queued),
        (EntryStatus::Processing, summary.processing),
        (EntryStatus::Visited, summary.visited),
        (EntryStatus::Failed, summary.failed),
    ] {
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Success rate: {:.1}%", summary.success_rate());
}
