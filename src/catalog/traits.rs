//! Catalog trait and error types
//!
//! This module defines the trait interface for catalog backends and
//! associated error types.

use crate::catalog::{
    CatalogEntry, ClassificationRunRecord, ClassificationRunStatus, CrawlRunRecord,
    CrawlRunStatus, FetchRecord, FetchStatus,
};
use crate::url::Scope;
use crate::UrlError;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Crawl run not found: {0}")]
    CrawlRunNotFound(i64),

    #[error("Classification run not found: {0}")]
    ClassificationRunNotFound(i64),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Trait for catalog backend implementations
///
/// The catalog is the single durable record of everything discovered,
/// fetched and classified. All URL writes go through [`Catalog::register`],
/// which canonicalizes exactly once; every other operation works on
/// `url_id`s handed out by registration.
pub trait Catalog {
    // ===== Crawl Run Management =====

    /// Creates a new crawl run in `running` state
    ///
    /// # Arguments
    ///
    /// * `scope` - The crawl boundary, stored as JSON on the run row
    /// * `config_hash` - Hash of the effective configuration
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_crawl_run(&mut self, scope: &Scope, config_hash: &str) -> CatalogResult<i64>;

    /// Gets a crawl run by ID
    fn get_crawl_run(&self, crawl_run_id: i64) -> CatalogResult<CrawlRunRecord>;

    /// Gets the most recent crawl run
    fn get_latest_crawl_run(&self) -> CatalogResult<Option<CrawlRunRecord>>;

    /// Overwrites the counters on a crawl run (checkpoint flush)
    fn update_crawl_counters(
        &mut self,
        crawl_run_id: i64,
        discovered: u64,
        fetched: u64,
        failed: u64,
    ) -> CatalogResult<()>;

    /// Marks a crawl run finished with the given terminal status
    fn finish_crawl_run(&mut self, crawl_run_id: i64, status: CrawlRunStatus) -> CatalogResult<()>;

    // ===== Entry Management =====

    /// Registers a URL, deduplicating on canonical form
    ///
    /// The candidate is canonicalized, then inserted if and only if no
    /// entry with that canonical form exists. The check-and-insert is a
    /// single atomic statement; concurrent registration of the same URL
    /// yields one row. An existing entry is returned unchanged: the first
    /// discovered parent wins and depth is never rewritten.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The URL as discovered (pre-canonicalization)
    /// * `parent_url_id` - The entry this URL was discovered from, None for seeds
    /// * `crawl_run_id` - The run doing the discovering
    ///
    /// # Returns
    ///
    /// The entry (new or existing) and whether it was newly created
    fn register(
        &mut self,
        candidate: &str,
        parent_url_id: Option<i64>,
        crawl_run_id: i64,
    ) -> CatalogResult<(CatalogEntry, bool)>;

    /// Gets an entry by ID
    fn entry(&self, url_id: i64) -> CatalogResult<CatalogEntry>;

    /// Gets an entry by canonical URL
    fn entry_by_url(&self, url_canonical: &str) -> CatalogResult<Option<CatalogEntry>>;

    /// Records the outcome of a fetch attempt
    ///
    /// The transition is guarded: only an entry still in `new` state is
    /// updated, so a fetch result lands at most once. Validator and
    /// snapshot columns are only overwritten when the record carries
    /// values, so a 304 keeps the stored snapshot and validators intact.
    /// Returns whether the row transitioned.
    fn record_fetch_result(&mut self, url_id: i64, record: &FetchRecord) -> CatalogResult<bool>;

    /// Puts one entry back on the frontier
    ///
    /// Resets `fetch_status` to `new` and clears the error message;
    /// everything else on the row (validators, snapshot, depth, parent)
    /// is kept, so the next fetch can send a conditional request.
    fn requeue_entry(&mut self, url_id: i64) -> CatalogResult<()>;

    /// Requeues every `error` entry for another fetch attempt
    ///
    /// Called at the start of a crawl so transient failures (rate
    /// limits, timeouts) from earlier runs get retried. Returns how many
    /// entries were requeued.
    fn requeue_fetch_errors(&mut self) -> CatalogResult<u64>;

    /// Sets the number of in-scope children extracted from an entry's page
    fn set_child_count(&mut self, url_id: i64, child_count: u32) -> CatalogResult<()>;

    /// Returns unfetched entries in discovery order
    ///
    /// The frontier is global, not scoped to one crawl run: entries left
    /// in `new` state by an interrupted crawl are picked up by the next
    /// one against the same database.
    fn frontier(&self, limit: usize) -> CatalogResult<Vec<CatalogEntry>>;

    // ===== Classification Run Management =====

    /// Creates a new leaf-to-root classification run in `running` state
    fn create_classification_run(
        &mut self,
        crawl_run_id: i64,
        budget_tokens: u64,
    ) -> CatalogResult<i64>;

    /// Gets a classification run by ID
    fn get_classification_run(
        &self,
        classification_run_id: i64,
    ) -> CatalogResult<ClassificationRunRecord>;

    /// Deepest depth that still has classifiable entries
    ///
    /// Only fetched, unclassified entries with fewer than `max_attempts`
    /// failed attempts count. `below` restricts the search to strictly
    /// shallower depths, for walking toward the root.
    fn max_unclassified_depth(
        &self,
        crawl_run_id: i64,
        below: Option<u32>,
        max_attempts: u32,
    ) -> CatalogResult<Option<u32>>;

    /// Classifiable entries at one depth, ordered by parent then discovery
    ///
    /// `offset` skips past the first rows of the ordering, letting a
    /// caller page through a depth wider than one query.
    fn unclassified_at_depth(
        &self,
        crawl_run_id: i64,
        depth: u32,
        max_attempts: u32,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<CatalogEntry>>;

    /// Persists a classification result for one entry
    ///
    /// Guarded: only an `unclassified` entry is updated. Returns whether
    /// the row transitioned; a false return means another run already
    /// classified it.
    fn record_classification(
        &mut self,
        url_id: i64,
        result: &serde_json::Value,
        classification_run_id: i64,
    ) -> CatalogResult<bool>;

    /// Increments the failed-attempt counter, returning the new value
    fn bump_classification_attempts(&mut self, url_id: i64) -> CatalogResult<u32>;

    /// Marks an entry permanently failed for classification
    fn mark_classification_failed(
        &mut self,
        url_id: i64,
        classification_run_id: i64,
    ) -> CatalogResult<()>;

    /// Atomically adds to a run's token counter, returning the new total
    fn add_tokens_used(&mut self, classification_run_id: i64, tokens: u64) -> CatalogResult<u64>;

    /// Updates progress counters and the resumable depth cursor
    fn update_classification_progress(
        &mut self,
        classification_run_id: i64,
        urls_classified: u64,
        errors: u64,
        current_depth: Option<u32>,
    ) -> CatalogResult<()>;

    /// Marks a classification run finished with the given terminal status
    fn finish_classification_run(
        &mut self,
        classification_run_id: i64,
        status: ClassificationRunStatus,
    ) -> CatalogResult<()>;

    // ===== Statistics =====

    /// Total entry count, optionally restricted to one crawl run
    fn count_entries(&self, crawl_run_id: Option<i64>) -> CatalogResult<u64>;

    /// Entry counts grouped by fetch status
    fn fetch_status_breakdown(&self) -> CatalogResult<HashMap<FetchStatus, u64>>;

    /// Entry counts grouped by classification status (raw status strings)
    fn classification_breakdown(&self) -> CatalogResult<HashMap<String, u64>>;

    /// Entry counts grouped by depth
    fn depth_breakdown(&self) -> CatalogResult<HashMap<u32, u64>>;

    /// All crawl runs, newest first
    fn list_crawl_runs(&self) -> CatalogResult<Vec<CrawlRunRecord>>;

    /// All classification runs, newest first
    fn list_classification_runs(&self) -> CatalogResult<Vec<ClassificationRunRecord>>;
}
