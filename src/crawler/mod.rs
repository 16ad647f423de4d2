//! Crawl orchestration
//!
//! This module ties the components together:
//! - Output directory layout and seed handling
//! - The crawl loop with guaranteed cleanup
//! - End-of-run statistics

mod coordinator;
mod layout;
mod summary;

pub use coordinator::{Coordinator, CrawlOptions};
pub use layout::{read_seeds, OutputLayout};
pub use summary::{print_summary, CrawlSummary, RunStats};
