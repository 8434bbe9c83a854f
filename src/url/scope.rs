use serde::{Deserialize, Serialize};
use url::Url;

/// The site boundary a crawl run stays inside
///
/// A URL is in scope when its host matches one of the allowed hosts and,
/// if any path prefixes are configured, its path starts with one of them.
/// The scope is serialized as JSON onto the crawl run row so a resumed or
/// audited run can see exactly what boundary it ran under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scope {
    /// Exact host names allowed (lowercase)
    pub hosts: Vec<String>,

    /// Optional path prefixes; empty means any path on an allowed host
    #[serde(default)]
    pub path_prefixes: Vec<String>,
}

impl Scope {
    /// Creates a scope covering a single host with no path restriction
    pub fn for_host(host: &str) -> Self {
        Self {
            hosts: vec![host.to_lowercase()],
            path_prefixes: Vec::new(),
        }
    }

    /// Derives a scope from a seed URL's host
    ///
    /// Returns None if the seed has no host (should not happen for a
    /// canonicalized URL).
    pub fn from_seed(seed: &str) -> Option<Self> {
        let url = Url::parse(seed).ok()?;
        url.host_str().map(Self::for_host)
    }

    /// Checks whether a canonical URL falls inside this scope
    pub fn allows(&self, url_str: &str) -> bool {
        let url = match Url::parse(url_str) {
            Ok(url) => url,
            Err(_) => return false,
        };

        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };

        if !self.hosts.iter().any(|h| *h == host) {
            return false;
        }

        if self.path_prefixes.is_empty() {
            return true;
        }

        let path = url.path();
        self.path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}
