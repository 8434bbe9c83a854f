//! Context assembly for oracle calls
//!
//! Descriptors are rebuilt from stored snapshots at classification time,
//! so classification can run long after the crawl, against a cold catalog.

use crate::catalog::{Catalog, CatalogEntry};
use crate::classify::oracle::{PageDescriptor, ParentContext};
use crate::fetch::SnapshotStore;
use crate::graph::extract_page;
use crate::Result;
use tracing::debug;
use url::Url;

/// Builds the oracle-facing descriptor for one catalog entry
///
/// Title, heading and excerpt come from the entry's snapshot; a missing
/// or unreadable snapshot degrades to a bare URL descriptor rather than
/// failing the batch.
pub fn page_descriptor(
    entry: &CatalogEntry,
    snapshots: &SnapshotStore,
    include_excerpts: bool,
) -> PageDescriptor {
    let mut descriptor = PageDescriptor {
        url: entry.url_canonical.clone(),
        depth: entry.depth,
        child_count: entry.child_count,
        title: None,
        heading: None,
        excerpt: None,
    };

    let snapshot_ref = match &entry.snapshot_ref {
        Some(snapshot_ref) => snapshot_ref,
        None => return descriptor,
    };

    let html = match snapshots.read_html(snapshot_ref) {
        Ok(html) => html,
        Err(e) => {
            debug!("Snapshot {} unreadable: {}", snapshot_ref, e);
            return descriptor;
        }
    };

    if let Ok(base) = Url::parse(&entry.url_canonical) {
        let page = extract_page(&html, &base);
        descriptor.title = page.title;
        descriptor.heading = page.heading;
        if include_excerpts {
            descriptor.excerpt = page.excerpt;
        }
    }

    descriptor
}

/// Loads the parent context for a sibling group
///
/// Returns None for root entries; for a parent that exists but has not
/// been classified yet, the context carries a null classification.
pub fn parent_context<C: Catalog>(
    catalog: &C,
    parent_url_id: Option<i64>,
) -> Result<Option<ParentContext>> {
    let parent_id = match parent_url_id {
        Some(parent_id) => parent_id,
        None => return Ok(None),
    };

    let parent = catalog.entry(parent_id)?;
    Ok(Some(ParentContext {
        url: parent.url_canonical,
        depth: parent.depth,
        classification: parent.classification_result,
    }))
}
