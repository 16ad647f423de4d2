//! Run settings
//!
//! This module handles loading, parsing, and validating the optional TOML
//! settings file. Every section and key has a default, so a run without a
//! settings file behaves like one with an empty file.
//!
//! # Example
//!
//! ```no_run
//! use rulecrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rulecrawl.toml")).unwrap();
//! println!("Frontier backend: {:?}", config.frontier.backend);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, DriverConfig, FrontierBackend, FrontierConfig, InteractionConfig, MouseConfig,
    NavigationConfig, SinkConfig, SinkKind, TorConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_or_default, parse_config};
pub use validation::validate;
