//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Arbor catalog.

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scope_json TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    urls_discovered INTEGER NOT NULL DEFAULT 0,
    urls_fetched INTEGER NOT NULL DEFAULT 0,
    urls_failed INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

-- Track classification runs over a crawl's tree
CREATE TABLE IF NOT EXISTS classification_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crawl_run_id INTEGER NOT NULL REFERENCES crawl_runs(id),
    strategy TEXT NOT NULL,
    budget_tokens INTEGER NOT NULL,
    tokens_used INTEGER NOT NULL DEFAULT 0,
    urls_classified INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    current_depth INTEGER,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_classification_runs_crawl
    ON classification_runs(crawl_run_id);

-- One row per unique canonical URL
CREATE TABLE IF NOT EXISTS url_catalog (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_canonical TEXT NOT NULL UNIQUE,
    parent_url_id INTEGER REFERENCES url_catalog(id),
    depth INTEGER NOT NULL DEFAULT 0,
    child_count INTEGER NOT NULL DEFAULT 0,
    crawl_run_id INTEGER NOT NULL REFERENCES crawl_runs(id),
    fetch_status TEXT NOT NULL DEFAULT 'new',
    http_status INTEGER,
    content_type TEXT,
    etag TEXT,
    last_modified TEXT,
    content_hash TEXT,
    snapshot_ref TEXT,
    fetched_at TEXT,
    error_message TEXT,
    classification_status TEXT NOT NULL DEFAULT 'unclassified',
    classification_result TEXT,
    classification_run_id INTEGER REFERENCES classification_runs(id),
    classification_attempts INTEGER NOT NULL DEFAULT 0,
    discovered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_url_catalog_fetch_status
    ON url_catalog(crawl_run_id, fetch_status);
CREATE INDEX IF NOT EXISTS idx_url_catalog_classification
    ON url_catalog(crawl_run_id, classification_status, depth);
CREATE INDEX IF NOT EXISTS idx_url_catalog_parent ON url_catalog(parent_url_id);
CREATE INDEX IF NOT EXISTS idx_url_catalog_depth ON url_catalog(depth);
"#;

/// Initializes the catalog schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["crawl_runs", "classification_runs", "url_catalog"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
