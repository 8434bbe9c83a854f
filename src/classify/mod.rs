//! Classification module: leaf-to-root progressive classification
//!
//! The engine never interprets page content itself; it assembles context
//! from the catalog and snapshots, hands batches to an [`Oracle`], and
//! persists whatever opaque classification comes back.

mod context;
mod oracle;
mod progressive;

pub use context::{page_descriptor, parent_context};
pub use oracle::{
    validate_response, HttpOracle, Oracle, OracleError, OracleRequest, OracleResponse,
    PageClassification, PageDescriptor, ParentContext,
};
pub use progressive::{ClassifySummary, ProgressiveClassifier};
