//! Graph module: turning fetched pages into a link tree
//!
//! - [`extract_page`] pulls links and lightweight descriptors (title,
//!   first heading, excerpt) out of an HTML body
//! - [`LinkGraphBuilder`] drives the breadth-first crawl over the
//!   durable frontier, registering children and recording fetch results

mod builder;
mod extract;

pub use builder::{CrawlSummary, LinkGraphBuilder};
pub use extract::{extract_page, PageContent};
