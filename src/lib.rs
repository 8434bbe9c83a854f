//! Arbor: a crawl-and-classify engine for large public sites
//!
//! This crate builds a deduplicated link tree of a site in SQLite, fetching
//! pages politely with conditional requests, and progressively classifies the
//! tree leaf-to-root under a resumable token budget.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod fetch;
pub mod graph;
pub mod report;
pub mod url;

use thiserror::Error;

/// Main error type for Arbor operations
#[derive(Debug, Error)]
pub enum ArborError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] classify::OracleError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl run {0} not found")]
    CrawlRunNotFound(i64),

    #[error("Seed URL out of scope: {0}")]
    SeedOutOfScope(String),
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

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Arbor operations
pub type Result<T> = std::result::Result<T, ArborError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogEntry, SqliteCatalog};
pub use config::Config;
pub use url::{canonicalize, is_html_url, Scope};
