//! rulecrawl: a rule-driven web crawler
//!
//! A crawl is described by a JSON task file (which links to follow, how to
//! load pages, which interactions to run and which metadata to extract) and
//! optional TOML run settings. The crawler pulls URLs from a persistent
//! frontier, loads them through a [`driver::PageDriver`] with retries,
//! challenge handling and IP rotation, and writes one JSON record and one
//! HTML snapshot per extracted page, optionally forwarding records to a
//! metadata sink.

pub mod config;
pub mod crawler;
pub mod driver;
pub mod extract;
pub mod frontier;
pub mod interaction;
pub mod navigator;
pub mod sink;
pub mod task;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for crawl runs
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] frontier::FrontierError),

    #[error("Driver error: {0}")]
    Driver(#[from] driver::DriverError),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Failed to read seed file {path}: {source}")]
    Seeds {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load {url} after {attempts} attempts: {message}")]
    Navigation {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Task file errors
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to read task file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse task: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid task: {0}")]
    Validation(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub use config::Config;
pub use crawler::{Coordinator, CrawlOptions, CrawlSummary};
pub use task::TaskConfig;
