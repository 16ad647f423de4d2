//! Interaction engine
//!
//! Runs the task's interaction rules (click, type, scroll, ...) on a loaded
//! page. Each rule is retried as a whole when its pre-condition, an action or
//! its validation fails. Page snapshots are cached by URL after every
//! successful rule and every page load.

mod cache;
mod engine;
mod types;

pub use cache::{PageSnapshot, PageStateCache, DEFAULT_CACHE_CAPACITY};
pub use engine::{InteractionEngine, InteractionError, InteractionReport};
pub use types::{ExtractOptions, InteractionRule, PageAction, ValidationRule, WaitCondition};
