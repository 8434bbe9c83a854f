//! Configuration module for Arbor
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every setting has a default, so the engine also runs without a file.
//!
//! # Example
//!
//! ```no_run
//! use arbor::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("arbor.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawl.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifyConfig, Config, CrawlConfig, HttpConfig, OracleConfig, OutputConfig, RetryConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

// Re-export validation
pub use validation::validate;
