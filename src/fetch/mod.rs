//! Fetch module: polite HTTP access and snapshot storage
//!
//! This module handles everything between the catalog and the network:
//! - a shared rate limiter enforcing one fixed delay between requests
//! - a conditional-GET fetcher with retry and outcome classification
//! - a content-addressed snapshot store for fetched HTML

mod client;
mod limiter;
mod snapshot;

pub use client::{build_http_client, FetchOutcome, Fetcher, Validators};
pub use limiter::RateLimiter;
pub use snapshot::{SnapshotMeta, SnapshotStore};
