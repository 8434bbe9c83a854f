use crate::url::Scope;
use serde::Deserialize;

/// Main configuration structure for Arbor
///
/// Every section has working defaults, so an empty file (or no file at
/// all) yields a usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub classify: ClassifyConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub oracle: OracleConfig,
    pub output: OutputConfig,

    /// Crawl scope; when absent it is derived from the seed URL's host
    pub scope: Option<Scope>,
}

/// Link graph construction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum depth to crawl from the seed URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of URLs to discover in one crawl
    #[serde(rename = "max-urls")]
    pub max_urls: u64,

    /// Minimum time between requests (milliseconds)
    #[serde(rename = "crawl-delay-ms")]
    pub crawl_delay_ms: u64,

    /// How many frontier entries to process between counter checkpoints
    #[serde(rename = "checkpoint-interval")]
    pub checkpoint_interval: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_urls: 10_000,
            crawl_delay_ms: 500,
            checkpoint_interval: 100,
        }
    }
}

/// Progressive classification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Token budget for one classification run
    #[serde(rename = "budget-tokens")]
    pub budget_tokens: u64,

    /// Maximum pages per oracle call
    #[serde(rename = "max-nodes-per-call")]
    pub max_nodes_per_call: usize,

    /// Whether page excerpts are sent to the oracle
    #[serde(rename = "include-excerpts")]
    pub include_excerpts: bool,

    /// Depth at or below which batches stay within one sibling group
    #[serde(rename = "parent-group-min-depth")]
    pub parent_group_min_depth: u32,

    /// Failed oracle calls per URL before it is marked failed
    #[serde(rename = "max-batch-attempts")]
    pub max_batch_attempts: u32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            budget_tokens: 1_000_000,
            max_nodes_per_call: 20,
            include_excerpts: true,
            parent_group_min_depth: 4,
            max_batch_attempts: 3,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Overall request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("arbor/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Retry policy for fetches and oracle calls
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Classification oracle endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// URL the classification requests are posted to
    pub endpoint: String,

    /// Request timeout (seconds); oracle calls can be slow
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/classify".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Output location configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite catalog database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory holding content-addressed page snapshots
    #[serde(rename = "snapshot-dir")]
    pub snapshot_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./arbor.db".to_string(),
            snapshot_dir: "./snapshots".to_string(),
        }
    }
}
