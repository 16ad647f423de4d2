//! Task definitions and rule matching
//!
//! A task file describes which links to follow, how to load pages, which
//! interactions to run and which metadata to extract. Patterns are compiled
//! once at load time; matching a URL against them is cheap and side-effect
//! free.

mod links;
mod loader;
mod matcher;
mod pattern;
mod types;

pub use links::{select_links, transform_link};
pub use loader::{compute_task_hash, load_task, load_task_with_hash, validate_task};
pub use matcher::{match_crawl_rules, match_interactions, match_metadata_rules, RuleSelection};
pub use pattern::Pattern;
pub use types::{
    BlockRule, CrawlRule, Interaction, LinkRuleTo, LinkTransformationRule, MetadataExtractionRule,
    MetadataField, SelectorList, TaskConfig, WaitForOptions,
};
