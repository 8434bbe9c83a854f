//! URL handling: canonicalization and crawl scope
//!
//! Every URL that enters the catalog passes through [`canonicalize`] first,
//! so the catalog's uniqueness guarantee is a guarantee about canonical forms.

mod canonical;
mod scope;

pub use canonical::{canonicalize, is_html_url};
pub use scope::Scope;
