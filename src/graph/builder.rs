//! Breadth-first link graph builder
//!
//! The builder drains the durable frontier in discovery order: fetch a
//! page, record the outcome, register in-scope child links, repeat.
//! Because the frontier lives in the catalog, an interrupted build
//! resumes from wherever the last one stopped.

use crate::catalog::{Catalog, CatalogEntry, CrawlRunStatus, FetchStatus};
use crate::config::CrawlConfig;
use crate::fetch::{FetchOutcome, Fetcher, Validators};
use crate::graph::extract_page;
use crate::url::{canonicalize, is_html_url, Scope};
use crate::{ArborError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

/// Outcome of one builder invocation
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub crawl_run_id: i64,
    pub status: CrawlRunStatus,
    pub urls_discovered: u64,
    pub urls_fetched: u64,
    pub urls_failed: u64,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct CrawlStats {
    discovered: u64,
    fetched: u64,
    failed: u64,
    processed: u64,
}

/// Drives a breadth-first crawl over the catalog's frontier
pub struct LinkGraphBuilder<'a, C: Catalog> {
    catalog: &'a mut C,
    fetcher: &'a Fetcher,
    scope: Scope,
    config: CrawlConfig,
    cancel: Arc<AtomicBool>,
}

impl<'a, C: Catalog> LinkGraphBuilder<'a, C> {
    pub fn new(
        catalog: &'a mut C,
        fetcher: &'a Fetcher,
        scope: Scope,
        config: CrawlConfig,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            scope,
            config,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Builds (or resumes building) the link graph from a seed URL
    ///
    /// Entries that errored in earlier builds are requeued first, and a
    /// seed already in the catalog is put back on the frontier for
    /// revalidation. The seed is registered at depth 0, then the
    /// frontier is drained batch by batch until it is empty, the
    /// discovery bound is reached, or cancellation is requested. A
    /// single failed fetch marks its entry and the crawl moves on; a
    /// catalog error fails the run.
    pub async fn run(&mut self, seed: &str, config_hash: &str) -> Result<CrawlSummary> {
        let seed_canonical = canonicalize(seed)?;
        if !self.scope.allows(&seed_canonical) {
            return Err(ArborError::SeedOutOfScope(seed_canonical));
        }

        let run_id = self.catalog.create_crawl_run(&self.scope, config_hash)?;
        info!(
            "Crawl run {} starting from {} (max_depth={}, max_urls={})",
            run_id, seed_canonical, self.config.max_depth, self.config.max_urls
        );

        let requeued = self.catalog.requeue_fetch_errors()?;
        if requeued > 0 {
            info!("Requeued {} previously failed urls for retry", requeued);
        }

        let mut stats = CrawlStats::default();
        let (seed_entry, created) = self.catalog.register(&seed_canonical, None, run_id)?;
        if created {
            stats.discovered += 1;
        } else {
            // A known seed is refetched every build so newly added links
            // are picked up; stored validators turn an unchanged page
            // into a 304.
            self.catalog.requeue_entry(seed_entry.url_id)?;
        }

        let outcome = self.drain_frontier(run_id, &mut stats).await;
        self.checkpoint(run_id, &stats)?;

        match outcome {
            Ok(cancelled) => {
                let status = if cancelled {
                    // Left running on purpose: the frontier is durable and
                    // the next invocation picks up where this one stopped.
                    info!("Crawl run {} cancelled; frontier preserved", run_id);
                    CrawlRunStatus::Running
                } else {
                    self.catalog.finish_crawl_run(run_id, CrawlRunStatus::Completed)?;
                    info!(
                        "Crawl run {} completed: {} discovered, {} fetched, {} failed",
                        run_id, stats.discovered, stats.fetched, stats.failed
                    );
                    CrawlRunStatus::Completed
                };
                Ok(CrawlSummary {
                    crawl_run_id: run_id,
                    status,
                    urls_discovered: stats.discovered,
                    urls_fetched: stats.fetched,
                    urls_failed: stats.failed,
                    cancelled,
                })
            }
            Err(e) => {
                error!("Crawl run {} failed: {}", run_id, e);
                self.catalog.finish_crawl_run(run_id, CrawlRunStatus::Failed)?;
                Err(e)
            }
        }
    }

    /// Processes frontier batches until exhaustion; returns whether the
    /// crawl was cancelled
    async fn drain_frontier(&mut self, run_id: i64, stats: &mut CrawlStats) -> Result<bool> {
        loop {
            if self.cancelled() {
                return Ok(true);
            }

            let batch = self.catalog.frontier(self.config.checkpoint_interval)?;
            if batch.is_empty() {
                return Ok(false);
            }

            for entry in batch {
                if self.cancelled() {
                    return Ok(true);
                }

                self.process_entry(run_id, &entry, stats).await?;
                stats.processed += 1;

                if stats.processed % 10 == 0 {
                    info!(
                        "Processed {} pages ({} discovered, {} fetched, {} failed)",
                        stats.processed, stats.discovered, stats.fetched, stats.failed
                    );
                }
            }

            self.checkpoint(run_id, stats)?;

            if stats.discovered >= self.config.max_urls {
                info!(
                    "Discovery bound reached ({} urls); stopping",
                    stats.discovered
                );
                return Ok(false);
            }
        }
    }

    /// Fetches one frontier entry, records the result and registers
    /// in-scope children
    async fn process_entry(
        &mut self,
        run_id: i64,
        entry: &CatalogEntry,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        let validators = Validators {
            etag: entry.etag.clone(),
            last_modified: entry.last_modified.clone(),
        };

        debug!("Fetching {} (depth {})", entry.url_canonical, entry.depth);
        let outcome = self.fetcher.fetch(&entry.url_canonical, &validators).await;

        let record = outcome.to_record();
        match record.status {
            FetchStatus::Fetched => stats.fetched += 1,
            FetchStatus::Error | FetchStatus::NotFound => stats.failed += 1,
            _ => {}
        }
        self.catalog.record_fetch_result(entry.url_id, &record)?;

        if let FetchOutcome::Fetched { body, .. } = outcome {
            self.expand_entry(run_id, entry, &body, stats)?;
        }

        Ok(())
    }

    /// Extracts child links from a fetched body and registers the
    /// in-scope ones under this entry
    fn expand_entry(
        &mut self,
        run_id: i64,
        entry: &CatalogEntry,
        body: &str,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        let base = Url::parse(&entry.url_canonical)?;
        let page = extract_page(body, &base);

        // Dedupe within the page; a repeated link is one child
        let mut seen = HashSet::new();
        let mut in_scope = Vec::new();
        for link in page.links {
            let canonical = match canonicalize(&link) {
                Ok(canonical) => canonical,
                Err(_) => continue,
            };
            if canonical == entry.url_canonical {
                continue;
            }
            if !self.scope.allows(&canonical) || !is_html_url(&canonical) {
                continue;
            }
            if seen.insert(canonical.clone()) {
                in_scope.push(canonical);
            }
        }

        self.catalog.set_child_count(entry.url_id, in_scope.len() as u32)?;

        if entry.depth >= self.config.max_depth {
            debug!(
                "Not expanding {} at max depth {}",
                entry.url_canonical, entry.depth
            );
            return Ok(());
        }

        for canonical in in_scope {
            if stats.discovered >= self.config.max_urls {
                break;
            }
            let (_, created) = self
                .catalog
                .register(&canonical, Some(entry.url_id), run_id)?;
            if created {
                stats.discovered += 1;
            }
        }

        Ok(())
    }

    fn checkpoint(&mut self, run_id: i64, stats: &CrawlStats) -> Result<()> {
        self.catalog
            .update_crawl_counters(run_id, stats.discovered, stats.fetched, stats.failed)?;
        Ok(())
    }
}
