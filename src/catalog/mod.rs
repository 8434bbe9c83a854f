//! Catalog module: the durable record of the crawl
//!
//! This module handles all database operations for the engine, including:
//! - SQLite schema management
//! - URL registration with canonical-form deduplication
//! - Fetch and classification status transitions
//! - Crawl and classification run tracking for resumption

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteCatalog;
pub use traits::{Catalog, CatalogError, CatalogResult};

use crate::ArborError;
use std::path::Path;

/// Opens (or creates) a catalog database at the given path
pub fn open_catalog(path: &Path) -> Result<SqliteCatalog, ArborError> {
    SqliteCatalog::new(path)
}

/// One row of the URL catalog
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub url_id: i64,
    pub url_canonical: String,
    pub parent_url_id: Option<i64>,
    pub depth: u32,
    pub child_count: u32,
    pub crawl_run_id: i64,
    pub fetch_status: FetchStatus,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: Option<String>,
    pub snapshot_ref: Option<String>,
    pub fetched_at: Option<String>,
    pub error_message: Option<String>,
    pub classification_status: ClassificationStatus,
    pub classification_result: Option<serde_json::Value>,
    pub classification_run_id: Option<i64>,
    pub classification_attempts: u32,
    pub discovered_at: String,
}

/// The data recorded against an entry after a fetch attempt
#[derive(Debug, Clone, Default)]
pub struct FetchRecord {
    pub status: FetchStatus,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_hash: Option<String>,
    pub snapshot_ref: Option<String>,
    pub error_message: Option<String>,
}

/// Fetch lifecycle of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchStatus {
    /// Registered, not yet attempted
    #[default]
    New,
    /// 200 with a stored snapshot
    Fetched,
    /// 304, prior snapshot still valid
    Cached,
    /// 404
    NotFound,
    /// Terminal failure (4xx/5xx after retries, network errors)
    Error,
    /// Fetched but not classifiable content (non-HTML)
    Skipped,
}

impl FetchStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Fetched => "fetched",
            Self::Cached => "cached",
            Self::NotFound => "not_found",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "fetched" => Some(Self::Fetched),
            "cached" => Some(Self::Cached),
            "not_found" => Some(Self::NotFound),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Classification lifecycle of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassificationStatus {
    #[default]
    Unclassified,
    Classified,
    Failed,
}

impl ClassificationStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Classified => "classified",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unclassified" => Some(Self::Unclassified),
            "classified" => Some(Self::Classified),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct CrawlRunRecord {
    pub crawl_run_id: i64,
    pub scope_json: String,
    pub config_hash: String,
    pub status: CrawlRunStatus,
    pub urls_discovered: u64,
    pub urls_fetched: u64,
    pub urls_failed: u64,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlRunStatus {
    Running,
    Completed,
    Failed,
}

impl CrawlRunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Represents a classification run
#[derive(Debug, Clone)]
pub struct ClassificationRunRecord {
    pub classification_run_id: i64,
    pub crawl_run_id: i64,
    pub strategy: String,
    pub budget_tokens: u64,
    pub tokens_used: u64,
    pub urls_classified: u64,
    pub errors: u64,
    pub status: ClassificationRunStatus,
    pub current_depth: Option<u32>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Status of a classification run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationRunStatus {
    Running,
    BudgetExceeded,
    Completed,
    Failed,
}

impl ClassificationRunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::BudgetExceeded => "budget_exceeded",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "budget_exceeded" => Some(Self::BudgetExceeded),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
