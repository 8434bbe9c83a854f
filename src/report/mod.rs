//! Statistics generation from the catalog
//!
//! This module provides functionality for extracting and displaying
//! catalog statistics: fetch and classification progress, the depth
//! profile of the link graph, and run history.

use crate::catalog::{
    Catalog, CatalogResult, ClassificationRunRecord, CrawlRunRecord, FetchStatus,
};
use std::collections::HashMap;

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Total number of cataloged URLs
    pub total_urls: u64,

    /// Count of URLs by fetch status
    pub by_fetch_status: HashMap<FetchStatus, u64>,

    /// Count of URLs by classification status (db string keyed)
    pub by_classification: HashMap<String, u64>,

    /// Count of URLs by depth
    pub by_depth: HashMap<u32, u64>,

    /// Crawl run history, newest first
    pub crawl_runs: Vec<CrawlRunRecord>,

    /// Classification run history, newest first
    pub classification_runs: Vec<ClassificationRunRecord>,
}

/// Loads statistics from the catalog
///
/// # Arguments
///
/// * `catalog` - The catalog to query
///
/// # Returns
///
/// * `Ok(CatalogStatistics)` - Successfully loaded statistics
/// * `Err(CatalogError)` - Failed to query statistics
pub fn load_statistics<C: Catalog>(catalog: &C) -> CatalogResult<CatalogStatistics> {
    let total_urls = catalog.count_entries(None)?;
    let by_fetch_status = catalog.fetch_status_breakdown()?;
    let by_classification = catalog.classification_breakdown()?;
    let by_depth = catalog.depth_breakdown()?;
    let crawl_runs = catalog.list_crawl_runs()?;
    let classification_runs = catalog.list_classification_runs()?;

    Ok(CatalogStatistics {
        total_urls,
        by_fetch_status,
        by_classification,
        by_depth,
        crawl_runs,
        classification_runs,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Total URLs cataloged: {}", stats.total_urls);
    println!();

    println!("Fetch Status:");
    let mut fetch_counts: Vec<_> = stats.by_fetch_status.iter().collect();
    fetch_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (status, count) in fetch_counts {
        let percentage = if stats.total_urls > 0 {
            (*count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status.to_db_string(), count, percentage);
    }
    println!();

    println!("Classification Status:");
    let mut class_counts: Vec<_> = stats.by_classification.iter().collect();
    class_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (status, count) in class_counts {
        println!("  {}: {}", status, count);
    }
    println!();

    println!("Depth Profile:");
    let mut depths: Vec<_> = stats.by_depth.iter().collect();
    depths.sort_by_key(|(depth, _)| **depth);
    for (depth, count) in depths {
        println!("  depth {}: {}", depth, count);
    }
    println!();

    if !stats.crawl_runs.is_empty() {
        println!("Crawl Runs:");
        for run in &stats.crawl_runs {
            println!(
                "  #{} [{}] {} discovered, {} fetched, {} failed (started {})",
                run.crawl_run_id,
                run.status.to_db_string(),
                run.urls_discovered,
                run.urls_fetched,
                run.urls_failed,
                run.started_at
            );
        }
        println!();
    }

    if !stats.classification_runs.is_empty() {
        println!("Classification Runs:");
        for run in &stats.classification_runs {
            let depth = run
                .current_depth
                .map(|d| format!(", stopped at depth {}", d))
                .unwrap_or_default();
            println!(
                "  #{} [{}] crawl #{}: {} classified, {} errors, {}/{} tokens{}",
                run.classification_run_id,
                run.status.to_db_string(),
                run.crawl_run_id,
                run.urls_classified,
                run.errors,
                run.tokens_used,
                run.budget_tokens,
                depth
            );
        }
        println!();
    }
}
