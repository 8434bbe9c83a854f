//! Budget-aware leaf-to-root progressive classifier
//!
//! The walk starts at the deepest unclassified depth and moves toward
//! the root, so parents are always classified after their children and
//! with their children's context available at deeper depths on earlier
//! runs. All progress is persisted per batch; a run that exhausts its
//! token budget records where it stopped and a later run continues from
//! the catalog state, never re-classifying what is already done.

use crate::catalog::{Catalog, CatalogEntry, ClassificationRunStatus};
use crate::classify::context::{page_descriptor, parent_context};
use crate::classify::oracle::{validate_response, Oracle, OracleError, OracleRequest, OracleResponse};
use crate::config::{ClassifyConfig, RetryConfig};
use crate::fetch::SnapshotStore;
use crate::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How many entries to pull per depth query
const DEPTH_PAGE_SIZE: usize = 500;

/// Outcome of one classifier invocation
#[derive(Debug, Clone)]
pub struct ClassifySummary {
    pub classification_run_id: i64,
    pub crawl_run_id: i64,
    pub status: ClassificationRunStatus,
    pub tokens_used: u64,
    pub urls_classified: u64,
    pub errors: u64,
    pub cancelled: bool,
}

/// Drives the leaf-to-root classification walk
pub struct ProgressiveClassifier<'a, C: Catalog, O: Oracle> {
    catalog: &'a mut C,
    oracle: &'a O,
    snapshots: &'a SnapshotStore,
    config: ClassifyConfig,
    retry: RetryConfig,
    cancel: Arc<AtomicBool>,
}

impl<'a, C: Catalog, O: Oracle> ProgressiveClassifier<'a, C, O> {
    pub fn new(
        catalog: &'a mut C,
        oracle: &'a O,
        snapshots: &'a SnapshotStore,
        config: ClassifyConfig,
        retry: RetryConfig,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            catalog,
            oracle,
            snapshots,
            config,
            retry,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Classifies a crawl run's tree from its leaves toward the root
    pub async fn run(&mut self, crawl_run_id: i64) -> Result<ClassifySummary> {
        // Reject unknown crawl runs up front
        self.catalog.get_crawl_run(crawl_run_id)?;

        let budget = self.config.budget_tokens;
        let max_attempts = self.config.max_batch_attempts;
        let run_id = self
            .catalog
            .create_classification_run(crawl_run_id, budget)?;
        info!(
            "Classification run {} over crawl run {} (budget {} tokens)",
            run_id, crawl_run_id, budget
        );

        let mut tokens_used: u64 = 0;
        let mut classified: u64 = 0;
        let mut errors: u64 = 0;
        let mut cancelled = false;
        let mut exceeded = false;

        // Batches that failed this run are skipped for its remainder;
        // their attempt counters decide run-over-run escalation.
        let mut skip: HashSet<i64> = HashSet::new();

        let mut current = self
            .catalog
            .max_unclassified_depth(crawl_run_id, None, max_attempts)?;

        'depths: while let Some(depth) = current {
            debug!("Classifying depth {}", depth);

            loop {
                if self.cancelled() {
                    cancelled = true;
                    break 'depths;
                }
                if tokens_used >= budget {
                    exceeded = true;
                    self.catalog
                        .update_classification_progress(run_id, classified, errors, Some(depth))?;
                    break 'depths;
                }

                // Entries skipped this run keep their positions in the
                // depth ordering, so page past them until a workable one
                // or the end of the depth shows up.
                let mut offset = 0;
                let workable = loop {
                    let page = self.catalog.unclassified_at_depth(
                        crawl_run_id,
                        depth,
                        max_attempts,
                        DEPTH_PAGE_SIZE,
                        offset,
                    )?;
                    let page_len = page.len();
                    let workable: Vec<CatalogEntry> = page
                        .into_iter()
                        .filter(|e| !skip.contains(&e.url_id))
                        .collect();
                    if !workable.is_empty() || page_len < DEPTH_PAGE_SIZE {
                        break workable;
                    }
                    offset += page_len;
                };
                if workable.is_empty() {
                    break;
                }

                for batch in self.make_batches(workable, depth) {
                    if self.cancelled() {
                        cancelled = true;
                        break 'depths;
                    }

                    let request = self.build_request(&batch)?;
                    match self.call_oracle(&request).await {
                        Ok(response) => {
                            for item in &response.classifications {
                                let entry = batch.iter().find(|e| e.url_canonical == item.url);
                                if let Some(entry) = entry {
                                    let stored = self.catalog.record_classification(
                                        entry.url_id,
                                        &item.classification,
                                        run_id,
                                    )?;
                                    if stored {
                                        classified += 1;
                                    } else {
                                        warn!(
                                            "{} was already classified; leaving it untouched",
                                            item.url
                                        );
                                    }
                                }
                            }
                            tokens_used =
                                self.catalog.add_tokens_used(run_id, response.tokens_used)?;
                            self.catalog.update_classification_progress(
                                run_id,
                                classified,
                                errors,
                                Some(depth),
                            )?;
                            if tokens_used >= budget {
                                info!("Token budget exhausted ({}/{})", tokens_used, budget);
                                exceeded = true;
                                break 'depths;
                            }
                        }
                        Err(e) => {
                            warn!(
                                "Oracle call failed for {} pages at depth {}: {}",
                                batch.len(),
                                depth,
                                e
                            );
                            errors += 1;
                            for entry in &batch {
                                skip.insert(entry.url_id);
                                let attempts =
                                    self.catalog.bump_classification_attempts(entry.url_id)?;
                                if attempts >= max_attempts {
                                    warn!(
                                        "{} failed {} classification attempts; marking failed",
                                        entry.url_canonical, attempts
                                    );
                                    self.catalog
                                        .mark_classification_failed(entry.url_id, run_id)?;
                                }
                            }
                            self.catalog.update_classification_progress(
                                run_id,
                                classified,
                                errors,
                                Some(depth),
                            )?;
                        }
                    }
                }
            }

            current = self
                .catalog
                .max_unclassified_depth(crawl_run_id, Some(depth), max_attempts)?;
        }

        let status = if cancelled {
            // Left running on purpose: catalog state carries the resume point
            info!("Classification run {} cancelled; resumable", run_id);
            ClassificationRunStatus::Running
        } else if exceeded {
            self.catalog
                .finish_classification_run(run_id, ClassificationRunStatus::BudgetExceeded)?;
            ClassificationRunStatus::BudgetExceeded
        } else {
            self.catalog
                .update_classification_progress(run_id, classified, errors, None)?;
            self.catalog
                .finish_classification_run(run_id, ClassificationRunStatus::Completed)?;
            ClassificationRunStatus::Completed
        };

        info!(
            "Classification run {} {}: {} classified, {} errors, {} tokens",
            run_id,
            status.to_db_string(),
            classified,
            errors,
            tokens_used
        );

        Ok(ClassifySummary {
            classification_run_id: run_id,
            crawl_run_id,
            status,
            tokens_used,
            urls_classified: classified,
            errors,
            cancelled,
        })
    }

    /// Splits one depth's entries into oracle-sized batches
    ///
    /// Deep in the tree sibling groups are the meaningful unit, so
    /// entries are grouped by parent before chunking. Near the root the
    /// groups are tiny; there entries are chunked across parents to keep
    /// calls full. Entries arrive ordered by parent, so both cases are a
    /// single pass.
    fn make_batches(&self, entries: Vec<CatalogEntry>, depth: u32) -> Vec<Vec<CatalogEntry>> {
        let chunk = self.config.max_nodes_per_call.max(1);
        let mut batches = Vec::new();

        if depth >= self.config.parent_group_min_depth {
            let mut group: Vec<CatalogEntry> = Vec::new();
            for entry in entries {
                let boundary = group
                    .last()
                    .map(|last| last.parent_url_id != entry.parent_url_id)
                    .unwrap_or(false);
                if boundary || group.len() >= chunk {
                    batches.push(std::mem::take(&mut group));
                }
                group.push(entry);
            }
            if !group.is_empty() {
                batches.push(group);
            }
        } else {
            let mut group: Vec<CatalogEntry> = Vec::new();
            for entry in entries {
                if group.len() >= chunk {
                    batches.push(std::mem::take(&mut group));
                }
                group.push(entry);
            }
            if !group.is_empty() {
                batches.push(group);
            }
        }

        batches
    }

    /// Assembles the oracle request for one batch
    fn build_request(&self, batch: &[CatalogEntry]) -> Result<OracleRequest> {
        // Parent context only when the whole batch shares one parent
        let parents: HashSet<Option<i64>> = batch.iter().map(|e| e.parent_url_id).collect();
        let parent = if parents.len() == 1 {
            let parent_id = batch[0].parent_url_id;
            parent_context(self.catalog, parent_id)?
        } else {
            None
        };

        let pages = batch
            .iter()
            .map(|entry| page_descriptor(entry, self.snapshots, self.config.include_excerpts))
            .collect();

        Ok(OracleRequest { parent, pages })
    }

    /// Calls the oracle with bounded retries and response validation
    async fn call_oracle(&self, request: &OracleRequest) -> std::result::Result<OracleResponse, OracleError> {
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let factor = 1u64 << (attempt - 1).min(16);
                let delay = Duration::from_millis(self.retry.base_delay_ms.saturating_mul(factor));
                debug!("Retrying oracle call (attempt {}) after {:?}", attempt + 1, delay);
                tokio::time::sleep(delay).await;
            }

            match self.oracle.classify(request).await {
                Ok(response) => match validate_response(request, &response) {
                    Ok(()) => return Ok(response),
                    Err(e) => last_error = Some(e),
                },
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| OracleError::InvalidResponse("no attempts made".to_string())))
    }
}
