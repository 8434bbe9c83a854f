//! SQLite catalog implementation
//!
//! This module provides a SQLite-based implementation of the Catalog trait.

use crate::catalog::schema::initialize_schema;
use crate::catalog::traits::{Catalog, CatalogError, CatalogResult};
use crate::catalog::{
    CatalogEntry, ClassificationRunRecord, ClassificationRunStatus, ClassificationStatus,
    CrawlRunRecord, CrawlRunStatus, FetchRecord, FetchStatus,
};
use crate::url::{canonicalize, Scope};
use crate::ArborError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const ENTRY_COLUMNS: &str = "id, url_canonical, parent_url_id, depth, child_count, crawl_run_id,
    fetch_status, http_status, content_type, etag, last_modified, content_hash, snapshot_ref,
    fetched_at, error_message, classification_status, classification_result,
    classification_run_id, classification_attempts, discovered_at";

fn entry_from_row(row: &Row) -> rusqlite::Result<CatalogEntry> {
    let result_text: Option<String> = row.get(16)?;
    Ok(CatalogEntry {
        url_id: row.get(0)?,
        url_canonical: row.get(1)?,
        parent_url_id: row.get(2)?,
        depth: row.get(3)?,
        child_count: row.get(4)?,
        crawl_run_id: row.get(5)?,
        fetch_status: FetchStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(FetchStatus::Error),
        http_status: row.get(7)?,
        content_type: row.get(8)?,
        etag: row.get(9)?,
        last_modified: row.get(10)?,
        content_hash: row.get(11)?,
        snapshot_ref: row.get(12)?,
        fetched_at: row.get(13)?,
        error_message: row.get(14)?,
        classification_status: ClassificationStatus::from_db_string(&row.get::<_, String>(15)?)
            .unwrap_or(ClassificationStatus::Unclassified),
        classification_result: result_text.and_then(|t| serde_json::from_str(&t).ok()),
        classification_run_id: row.get(17)?,
        classification_attempts: row.get(18)?,
        discovered_at: row.get(19)?,
    })
}

fn crawl_run_from_row(row: &Row) -> rusqlite::Result<CrawlRunRecord> {
    Ok(CrawlRunRecord {
        crawl_run_id: row.get(0)?,
        scope_json: row.get(1)?,
        config_hash: row.get(2)?,
        status: CrawlRunStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(CrawlRunStatus::Running),
        urls_discovered: row.get::<_, i64>(4)? as u64,
        urls_fetched: row.get::<_, i64>(5)? as u64,
        urls_failed: row.get::<_, i64>(6)? as u64,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

fn classification_run_from_row(row: &Row) -> rusqlite::Result<ClassificationRunRecord> {
    Ok(ClassificationRunRecord {
        classification_run_id: row.get(0)?,
        crawl_run_id: row.get(1)?,
        strategy: row.get(2)?,
        budget_tokens: row.get::<_, i64>(3)? as u64,
        tokens_used: row.get::<_, i64>(4)? as u64,
        urls_classified: row.get::<_, i64>(5)? as u64,
        errors: row.get::<_, i64>(6)? as u64,
        status: ClassificationRunStatus::from_db_string(&row.get::<_, String>(7)?)
            .unwrap_or(ClassificationRunStatus::Running),
        current_depth: row.get(8)?,
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

/// SQLite catalog backend
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Creates a new SqliteCatalog instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCatalog)` - Successfully opened/created database
    /// * `Err(ArborError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ArborError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, ArborError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn entry_by_canonical(&self, canonical: &str) -> CatalogResult<CatalogEntry> {
        let sql = format!(
            "SELECT {} FROM url_catalog WHERE url_canonical = ?1",
            ENTRY_COLUMNS
        );
        let entry = self
            .conn
            .query_row(&sql, params![canonical], entry_from_row)?;
        Ok(entry)
    }
}

impl Catalog for SqliteCatalog {
    // ===== Crawl Run Management =====

    fn create_crawl_run(&mut self, scope: &Scope, config_hash: &str) -> CatalogResult<i64> {
        let now = Utc::now().to_rfc3339();
        let scope_json = serde_json::to_string(scope)?;
        self.conn.execute(
            "INSERT INTO crawl_runs (scope_json, config_hash, status, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                scope_json,
                config_hash,
                CrawlRunStatus::Running.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_crawl_run(&self, crawl_run_id: i64) -> CatalogResult<CrawlRunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, scope_json, config_hash, status, urls_discovered, urls_fetched,
             urls_failed, started_at, completed_at FROM crawl_runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![crawl_run_id], crawl_run_from_row)
            .map_err(|_| CatalogError::CrawlRunNotFound(crawl_run_id))?;

        Ok(run)
    }

    fn get_latest_crawl_run(&self) -> CatalogResult<Option<CrawlRunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, scope_json, config_hash, status, urls_discovered, urls_fetched,
             urls_failed, started_at, completed_at FROM crawl_runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt.query_row([], crawl_run_from_row).optional()?;
        Ok(run)
    }

    fn update_crawl_counters(
        &mut self,
        crawl_run_id: i64,
        discovered: u64,
        fetched: u64,
        failed: u64,
    ) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE crawl_runs SET urls_discovered = ?1, urls_fetched = ?2, urls_failed = ?3
             WHERE id = ?4",
            params![discovered as i64, fetched as i64, failed as i64, crawl_run_id],
        )?;
        Ok(())
    }

    fn finish_crawl_run(&mut self, crawl_run_id: i64, status: CrawlRunStatus) -> CatalogResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, crawl_run_id],
        )?;
        Ok(())
    }

    // ===== Entry Management =====

    fn register(
        &mut self,
        candidate: &str,
        parent_url_id: Option<i64>,
        crawl_run_id: i64,
    ) -> CatalogResult<(CatalogEntry, bool)> {
        let canonical = canonicalize(candidate)?;

        let depth: u32 = match parent_url_id {
            Some(parent_id) => {
                let parent_depth: u32 = self
                    .conn
                    .query_row(
                        "SELECT depth FROM url_catalog WHERE id = ?1",
                        params![parent_id],
                        |row| row.get(0),
                    )
                    .map_err(|_| CatalogError::EntryNotFound(parent_id))?;
                parent_depth + 1
            }
            None => 0,
        };

        // Atomic check-and-insert: the UNIQUE constraint on url_canonical
        // decides; a duplicate registration is a no-op.
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO url_catalog
             (url_canonical, parent_url_id, depth, crawl_run_id, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url_canonical) DO NOTHING",
            params![canonical, parent_url_id, depth, crawl_run_id, now],
        )? > 0;

        let entry = self.entry_by_canonical(&canonical)?;
        Ok((entry, inserted))
    }

    fn entry(&self, url_id: i64) -> CatalogResult<CatalogEntry> {
        let sql = format!("SELECT {} FROM url_catalog WHERE id = ?1", ENTRY_COLUMNS);
        let entry = self
            .conn
            .query_row(&sql, params![url_id], entry_from_row)
            .map_err(|_| CatalogError::EntryNotFound(url_id))?;
        Ok(entry)
    }

    fn entry_by_url(&self, url_canonical: &str) -> CatalogResult<Option<CatalogEntry>> {
        let sql = format!(
            "SELECT {} FROM url_catalog WHERE url_canonical = ?1",
            ENTRY_COLUMNS
        );
        let entry = self
            .conn
            .query_row(&sql, params![url_canonical], entry_from_row)
            .optional()?;
        Ok(entry)
    }

    fn record_fetch_result(&mut self, url_id: i64, record: &FetchRecord) -> CatalogResult<bool> {
        // COALESCE keeps validators and the snapshot from an earlier
        // fetch when the new record has none, as on a 304 revalidation.
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE url_catalog SET fetch_status = ?1, http_status = ?2,
             content_type = COALESCE(?3, content_type),
             etag = COALESCE(?4, etag),
             last_modified = COALESCE(?5, last_modified),
             content_hash = COALESCE(?6, content_hash),
             snapshot_ref = COALESCE(?7, snapshot_ref),
             error_message = ?8, fetched_at = ?9
             WHERE id = ?10 AND fetch_status = 'new'",
            params![
                record.status.to_db_string(),
                record.http_status,
                record.content_type,
                record.etag,
                record.last_modified,
                record.content_hash,
                record.snapshot_ref,
                record.error_message,
                now,
                url_id
            ],
        )?;
        Ok(changed > 0)
    }

    fn set_child_count(&mut self, url_id: i64, child_count: u32) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE url_catalog SET child_count = ?1 WHERE id = ?2",
            params![child_count, url_id],
        )?;
        Ok(())
    }

    fn requeue_entry(&mut self, url_id: i64) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE url_catalog SET fetch_status = 'new', error_message = NULL
             WHERE id = ?1",
            params![url_id],
        )?;
        Ok(())
    }

    fn requeue_fetch_errors(&mut self) -> CatalogResult<u64> {
        let changed = self.conn.execute(
            "UPDATE url_catalog SET fetch_status = 'new', error_message = NULL
             WHERE fetch_status = 'error'",
            [],
        )?;
        Ok(changed as u64)
    }

    fn frontier(&self, limit: usize) -> CatalogResult<Vec<CatalogEntry>> {
        let sql = format!(
            "SELECT {} FROM url_catalog WHERE fetch_status = 'new'
             ORDER BY id ASC LIMIT ?1",
            ENTRY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![limit as i64], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ===== Classification Run Management =====

    fn create_classification_run(
        &mut self,
        crawl_run_id: i64,
        budget_tokens: u64,
    ) -> CatalogResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO classification_runs
             (crawl_run_id, strategy, budget_tokens, status, started_at)
             VALUES (?1, 'leaf_to_root', ?2, ?3, ?4)",
            params![
                crawl_run_id,
                budget_tokens as i64,
                ClassificationRunStatus::Running.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_classification_run(
        &self,
        classification_run_id: i64,
    ) -> CatalogResult<ClassificationRunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_run_id, strategy, budget_tokens, tokens_used, urls_classified,
             errors, status, current_depth, started_at, completed_at
             FROM classification_runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![classification_run_id], classification_run_from_row)
            .map_err(|_| CatalogError::ClassificationRunNotFound(classification_run_id))?;

        Ok(run)
    }

    fn max_unclassified_depth(
        &self,
        crawl_run_id: i64,
        below: Option<u32>,
        max_attempts: u32,
    ) -> CatalogResult<Option<u32>> {
        let depth: Option<u32> = match below {
            Some(ceiling) => self.conn.query_row(
                "SELECT MAX(depth) FROM url_catalog
                 WHERE crawl_run_id = ?1 AND fetch_status = 'fetched'
                 AND classification_status = 'unclassified'
                 AND classification_attempts < ?2 AND depth < ?3",
                params![crawl_run_id, max_attempts, ceiling],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT MAX(depth) FROM url_catalog
                 WHERE crawl_run_id = ?1 AND fetch_status = 'fetched'
                 AND classification_status = 'unclassified'
                 AND classification_attempts < ?2",
                params![crawl_run_id, max_attempts],
                |row| row.get(0),
            )?,
        };
        Ok(depth)
    }

    fn unclassified_at_depth(
        &self,
        crawl_run_id: i64,
        depth: u32,
        max_attempts: u32,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<CatalogEntry>> {
        let sql = format!(
            "SELECT {} FROM url_catalog
             WHERE crawl_run_id = ?1 AND depth = ?2 AND fetch_status = 'fetched'
             AND classification_status = 'unclassified' AND classification_attempts < ?3
             ORDER BY parent_url_id ASC, id ASC LIMIT ?4 OFFSET ?5",
            ENTRY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(
                params![crawl_run_id, depth, max_attempts, limit as i64, offset as i64],
                entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn record_classification(
        &mut self,
        url_id: i64,
        result: &serde_json::Value,
        classification_run_id: i64,
    ) -> CatalogResult<bool> {
        let result_text = serde_json::to_string(result)?;
        let changed = self.conn.execute(
            "UPDATE url_catalog SET classification_status = 'classified',
             classification_result = ?1, classification_run_id = ?2
             WHERE id = ?3 AND classification_status = 'unclassified'",
            params![result_text, classification_run_id, url_id],
        )?;
        Ok(changed > 0)
    }

    fn bump_classification_attempts(&mut self, url_id: i64) -> CatalogResult<u32> {
        self.conn.execute(
            "UPDATE url_catalog SET classification_attempts = classification_attempts + 1
             WHERE id = ?1",
            params![url_id],
        )?;
        let attempts: u32 = self.conn.query_row(
            "SELECT classification_attempts FROM url_catalog WHERE id = ?1",
            params![url_id],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }

    fn mark_classification_failed(
        &mut self,
        url_id: i64,
        classification_run_id: i64,
    ) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE url_catalog SET classification_status = 'failed',
             classification_run_id = ?1
             WHERE id = ?2 AND classification_status = 'unclassified'",
            params![classification_run_id, url_id],
        )?;
        Ok(())
    }

    fn add_tokens_used(&mut self, classification_run_id: i64, tokens: u64) -> CatalogResult<u64> {
        self.conn.execute(
            "UPDATE classification_runs SET tokens_used = tokens_used + ?1 WHERE id = ?2",
            params![tokens as i64, classification_run_id],
        )?;
        let total: i64 = self.conn.query_row(
            "SELECT tokens_used FROM classification_runs WHERE id = ?1",
            params![classification_run_id],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    fn update_classification_progress(
        &mut self,
        classification_run_id: i64,
        urls_classified: u64,
        errors: u64,
        current_depth: Option<u32>,
    ) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE classification_runs SET urls_classified = ?1, errors = ?2, current_depth = ?3
             WHERE id = ?4",
            params![
                urls_classified as i64,
                errors as i64,
                current_depth,
                classification_run_id
            ],
        )?;
        Ok(())
    }

    fn finish_classification_run(
        &mut self,
        classification_run_id: i64,
        status: ClassificationRunStatus,
    ) -> CatalogResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE classification_runs SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, classification_run_id],
        )?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_entries(&self, crawl_run_id: Option<i64>) -> CatalogResult<u64> {
        let count: i64 = match crawl_run_id {
            Some(run_id) => self.conn.query_row(
                "SELECT COUNT(*) FROM url_catalog WHERE crawl_run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM url_catalog", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn fetch_status_breakdown(&self) -> CatalogResult<HashMap<FetchStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fetch_status, COUNT(*) FROM url_catalog GROUP BY fetch_status")?;

        let mut breakdown = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = FetchStatus::from_db_string(&status_str) {
                breakdown.insert(status, count as u64);
            }
        }

        Ok(breakdown)
    }

    fn classification_breakdown(&self) -> CatalogResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT classification_status, COUNT(*) FROM url_catalog
             GROUP BY classification_status",
        )?;

        let mut breakdown = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            breakdown.insert(status, count as u64);
        }

        Ok(breakdown)
    }

    fn depth_breakdown(&self) -> CatalogResult<HashMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM url_catalog GROUP BY depth ORDER BY depth")?;

        let mut breakdown = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }

        Ok(breakdown)
    }

    fn list_crawl_runs(&self) -> CatalogResult<Vec<CrawlRunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, scope_json, config_hash, status, urls_discovered, urls_fetched,
             urls_failed, started_at, completed_at FROM crawl_runs ORDER BY id DESC",
        )?;

        let runs = stmt
            .query_map([], crawl_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn list_classification_runs(&self) -> CatalogResult<Vec<ClassificationRunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, crawl_run_id, strategy, budget_tokens, tokens_used, urls_classified,
             errors, status, current_depth, started_at, completed_at
             FROM classification_runs ORDER BY id DESC",
        )?;

        let runs = stmt
            .query_map([], classification_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog_with_run() -> (SqliteCatalog, i64) {
        let mut catalog = SqliteCatalog::new_in_memory().unwrap();
        let scope = Scope::for_host("example.com");
        let run_id = catalog.create_crawl_run(&scope, "test_hash").unwrap();
        (catalog, run_id)
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteCatalog::new_in_memory().is_ok());
    }

    #[test]
    fn test_create_crawl_run() {
        let (catalog, run_id) = catalog_with_run();
        assert!(run_id > 0);
        let run = catalog.get_crawl_run(run_id).unwrap();
        assert_eq!(run.status, CrawlRunStatus::Running);
        assert_eq!(run.config_hash, "test_hash");
    }

    #[test]
    fn test_register_seed() {
        let (mut catalog, run_id) = catalog_with_run();
        let (entry, created) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        assert!(created);
        assert_eq!(entry.depth, 0);
        assert_eq!(entry.parent_url_id, None);
        assert_eq!(entry.fetch_status, FetchStatus::New);
        assert_eq!(entry.classification_status, ClassificationStatus::Unclassified);
    }

    #[test]
    fn test_register_canonicalizes() {
        let (mut catalog, run_id) = catalog_with_run();
        let (entry, _) = catalog
            .register("HTTPS://Example.COM/a/../page#frag", None, run_id)
            .unwrap();
        assert_eq!(entry.url_canonical, "https://example.com/page");
    }

    #[test]
    fn test_register_duplicate_returns_existing() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let (first, created1) = catalog
            .register("https://example.com/page", Some(seed.url_id), run_id)
            .unwrap();
        assert!(created1);

        // Same URL via a different parent and messier spelling
        let (second, created2) = catalog
            .register("https://example.com/page#section", None, run_id)
            .unwrap();
        assert!(!created2);
        assert_eq!(first.url_id, second.url_id);
        // First-discovered parent and depth are untouched
        assert_eq!(second.parent_url_id, Some(seed.url_id));
        assert_eq!(second.depth, 1);
    }

    #[test]
    fn test_register_depth_follows_parent() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let (child, _) = catalog
            .register("https://example.com/a", Some(seed.url_id), run_id)
            .unwrap();
        let (grandchild, _) = catalog
            .register("https://example.com/a/b", Some(child.url_id), run_id)
            .unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(grandchild.depth, 2);
    }

    #[test]
    fn test_register_missing_parent() {
        let (mut catalog, run_id) = catalog_with_run();
        let result = catalog.register("https://example.com/x", Some(999), run_id);
        assert!(matches!(result, Err(CatalogError::EntryNotFound(999))));
    }

    #[test]
    fn test_record_fetch_result_once() {
        let (mut catalog, run_id) = catalog_with_run();
        let (entry, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();

        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            content_type: Some("text/html".to_string()),
            etag: Some("\"abc\"".to_string()),
            content_hash: Some("deadbeef".to_string()),
            snapshot_ref: Some("deadbeef.html".to_string()),
            ..Default::default()
        };

        assert!(catalog.record_fetch_result(entry.url_id, &record).unwrap());
        // Second application is rejected by the status guard
        assert!(!catalog.record_fetch_result(entry.url_id, &record).unwrap());

        let stored = catalog.entry(entry.url_id).unwrap();
        assert_eq!(stored.fetch_status, FetchStatus::Fetched);
        assert_eq!(stored.http_status, Some(200));
        assert_eq!(stored.etag, Some("\"abc\"".to_string()));
        assert!(stored.fetched_at.is_some());
    }

    #[test]
    fn test_frontier_discovery_order() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        catalog
            .register("https://example.com/b", Some(seed.url_id), run_id)
            .unwrap();
        catalog
            .register("https://example.com/a", Some(seed.url_id), run_id)
            .unwrap();

        let frontier = catalog.frontier(10).unwrap();
        let urls: Vec<&str> = frontier.iter().map(|e| e.url_canonical.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/b",
                "https://example.com/a"
            ]
        );

        // Fetched entries leave the frontier
        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            ..Default::default()
        };
        catalog.record_fetch_result(seed.url_id, &record).unwrap();
        assert_eq!(catalog.frontier(10).unwrap().len(), 2);
    }

    #[test]
    fn test_unclassified_at_depth_pages_with_offset() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            ..Default::default()
        };
        for i in 0..5 {
            let (child, _) = catalog
                .register(
                    &format!("https://example.com/p{}", i),
                    Some(seed.url_id),
                    run_id,
                )
                .unwrap();
            catalog.record_fetch_result(child.url_id, &record).unwrap();
        }

        let first = catalog.unclassified_at_depth(run_id, 1, 3, 2, 0).unwrap();
        let second = catalog.unclassified_at_depth(run_id, 1, 3, 2, 2).unwrap();
        let rest = catalog.unclassified_at_depth(run_id, 1, 3, 10, 4).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(first[0].url_canonical, "https://example.com/p0");
        assert_eq!(second[0].url_canonical, "https://example.com/p2");
        assert_eq!(rest[0].url_canonical, "https://example.com/p4");
    }

    #[test]
    fn test_requeue_errors_restores_frontier() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let (child, _) = catalog
            .register("https://example.com/a", Some(seed.url_id), run_id)
            .unwrap();

        catalog
            .record_fetch_result(
                seed.url_id,
                &FetchRecord {
                    status: FetchStatus::Fetched,
                    http_status: Some(200),
                    ..Default::default()
                },
            )
            .unwrap();
        catalog
            .record_fetch_result(
                child.url_id,
                &FetchRecord {
                    status: FetchStatus::Error,
                    http_status: Some(503),
                    error_message: Some("HTTP 503".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(catalog.frontier(10).unwrap().is_empty());

        assert_eq!(catalog.requeue_fetch_errors().unwrap(), 1);
        let requeued = catalog.entry(child.url_id).unwrap();
        assert_eq!(requeued.fetch_status, FetchStatus::New);
        assert!(requeued.error_message.is_none());

        let frontier = catalog.frontier(10).unwrap();
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier[0].url_id, child.url_id);

        // Nothing left in error state, so a second pass is a no-op
        assert_eq!(catalog.requeue_fetch_errors().unwrap(), 0);
    }

    #[test]
    fn test_requeue_entry_keeps_validators_through_revalidation() {
        let (mut catalog, run_id) = catalog_with_run();
        let (entry, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        catalog
            .record_fetch_result(
                entry.url_id,
                &FetchRecord {
                    status: FetchStatus::Fetched,
                    http_status: Some(200),
                    etag: Some("\"v1\"".to_string()),
                    content_hash: Some("deadbeef".to_string()),
                    snapshot_ref: Some("deadbeef.html".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        catalog.requeue_entry(entry.url_id).unwrap();
        let requeued = catalog.entry(entry.url_id).unwrap();
        assert_eq!(requeued.fetch_status, FetchStatus::New);
        assert_eq!(requeued.etag, Some("\"v1\"".to_string()));
        assert_eq!(requeued.snapshot_ref, Some("deadbeef.html".to_string()));

        // A 304 record carries no validators or snapshot; the stored
        // ones must survive the transition.
        assert!(catalog
            .record_fetch_result(
                entry.url_id,
                &FetchRecord {
                    status: FetchStatus::Cached,
                    http_status: Some(304),
                    ..Default::default()
                },
            )
            .unwrap());
        let cached = catalog.entry(entry.url_id).unwrap();
        assert_eq!(cached.fetch_status, FetchStatus::Cached);
        assert_eq!(cached.http_status, Some(304));
        assert_eq!(cached.etag, Some("\"v1\"".to_string()));
        assert_eq!(cached.content_hash, Some("deadbeef".to_string()));
        assert_eq!(cached.snapshot_ref, Some("deadbeef.html".to_string()));
    }

    #[test]
    fn test_record_classification_once() {
        let (mut catalog, run_id) = catalog_with_run();
        let (entry, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let cls_run = catalog.create_classification_run(run_id, 1000).unwrap();

        let result = json!({"category": "archive_index", "confidence": 0.9});
        assert!(catalog
            .record_classification(entry.url_id, &result, cls_run)
            .unwrap());
        assert!(!catalog
            .record_classification(entry.url_id, &result, cls_run)
            .unwrap());

        let stored = catalog.entry(entry.url_id).unwrap();
        assert_eq!(stored.classification_status, ClassificationStatus::Classified);
        assert_eq!(stored.classification_result, Some(result));
        assert_eq!(stored.classification_run_id, Some(cls_run));
    }

    #[test]
    fn test_add_tokens_used_accumulates() {
        let (mut catalog, run_id) = catalog_with_run();
        let cls_run = catalog.create_classification_run(run_id, 1000).unwrap();

        assert_eq!(catalog.add_tokens_used(cls_run, 500).unwrap(), 500);
        assert_eq!(catalog.add_tokens_used(cls_run, 500).unwrap(), 1000);

        let run = catalog.get_classification_run(cls_run).unwrap();
        assert_eq!(run.tokens_used, 1000);
        assert_eq!(run.budget_tokens, 1000);
    }

    #[test]
    fn test_max_unclassified_depth() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let (child, _) = catalog
            .register("https://example.com/a", Some(seed.url_id), run_id)
            .unwrap();
        let (leaf, _) = catalog
            .register("https://example.com/a/b", Some(child.url_id), run_id)
            .unwrap();

        // Nothing fetched yet, so nothing is classifiable
        assert_eq!(
            catalog.max_unclassified_depth(run_id, None, 3).unwrap(),
            None
        );

        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            ..Default::default()
        };
        for id in [seed.url_id, child.url_id, leaf.url_id] {
            catalog.record_fetch_result(id, &record).unwrap();
        }

        assert_eq!(
            catalog.max_unclassified_depth(run_id, None, 3).unwrap(),
            Some(2)
        );
        assert_eq!(
            catalog.max_unclassified_depth(run_id, Some(2), 3).unwrap(),
            Some(1)
        );

        let cls_run = catalog.create_classification_run(run_id, 1000).unwrap();
        catalog
            .record_classification(leaf.url_id, &json!({"c": "leaf"}), cls_run)
            .unwrap();
        assert_eq!(
            catalog.max_unclassified_depth(run_id, None, 3).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn test_attempts_exclude_from_classifiable() {
        let (mut catalog, run_id) = catalog_with_run();
        let (entry, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            ..Default::default()
        };
        catalog.record_fetch_result(entry.url_id, &record).unwrap();

        assert_eq!(catalog.bump_classification_attempts(entry.url_id).unwrap(), 1);
        assert_eq!(catalog.bump_classification_attempts(entry.url_id).unwrap(), 2);
        assert_eq!(
            catalog.max_unclassified_depth(run_id, None, 3).unwrap(),
            Some(0)
        );

        assert_eq!(catalog.bump_classification_attempts(entry.url_id).unwrap(), 3);
        assert_eq!(
            catalog.max_unclassified_depth(run_id, None, 3).unwrap(),
            None
        );
    }

    #[test]
    fn test_unclassified_at_depth_orders_by_parent() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        let (p1, _) = catalog
            .register("https://example.com/a", Some(seed.url_id), run_id)
            .unwrap();
        let (p2, _) = catalog
            .register("https://example.com/b", Some(seed.url_id), run_id)
            .unwrap();
        // Interleave discovery across the two parents
        let (c1, _) = catalog
            .register("https://example.com/a/1", Some(p1.url_id), run_id)
            .unwrap();
        let (c2, _) = catalog
            .register("https://example.com/b/1", Some(p2.url_id), run_id)
            .unwrap();
        let (c3, _) = catalog
            .register("https://example.com/a/2", Some(p1.url_id), run_id)
            .unwrap();

        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            ..Default::default()
        };
        for id in [c1.url_id, c2.url_id, c3.url_id] {
            catalog.record_fetch_result(id, &record).unwrap();
        }

        let entries = catalog.unclassified_at_depth(run_id, 2, 3, 10, 0).unwrap();
        let parents: Vec<Option<i64>> = entries.iter().map(|e| e.parent_url_id).collect();
        assert_eq!(
            parents,
            vec![Some(p1.url_id), Some(p1.url_id), Some(p2.url_id)]
        );
    }

    #[test]
    fn test_breakdowns() {
        let (mut catalog, run_id) = catalog_with_run();
        let (seed, _) = catalog
            .register("https://example.com/", None, run_id)
            .unwrap();
        catalog
            .register("https://example.com/a", Some(seed.url_id), run_id)
            .unwrap();

        let record = FetchRecord {
            status: FetchStatus::Fetched,
            http_status: Some(200),
            ..Default::default()
        };
        catalog.record_fetch_result(seed.url_id, &record).unwrap();

        let fetch = catalog.fetch_status_breakdown().unwrap();
        assert_eq!(fetch.get(&FetchStatus::Fetched), Some(&1));
        assert_eq!(fetch.get(&FetchStatus::New), Some(&1));

        let depth = catalog.depth_breakdown().unwrap();
        assert_eq!(depth.get(&0), Some(&1));
        assert_eq!(depth.get(&1), Some(&1));

        assert_eq!(catalog.count_entries(Some(run_id)).unwrap(), 2);
        assert_eq!(catalog.count_entries(None).unwrap(), 2);
    }

    #[test]
    fn test_finish_runs() {
        let (mut catalog, run_id) = catalog_with_run();
        catalog
            .finish_crawl_run(run_id, CrawlRunStatus::Completed)
            .unwrap();
        let run = catalog.get_crawl_run(run_id).unwrap();
        assert_eq!(run.status, CrawlRunStatus::Completed);
        assert!(run.completed_at.is_some());

        let cls_run = catalog.create_classification_run(run_id, 500).unwrap();
        catalog
            .update_classification_progress(cls_run, 6, 0, Some(2))
            .unwrap();
        catalog
            .finish_classification_run(cls_run, ClassificationRunStatus::BudgetExceeded)
            .unwrap();
        let run = catalog.get_classification_run(cls_run).unwrap();
        assert_eq!(run.status, ClassificationRunStatus::BudgetExceeded);
        assert_eq!(run.current_depth, Some(2));
        assert_eq!(run.urls_classified, 6);
    }
}
