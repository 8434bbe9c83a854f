//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the engine, including:
//! - Building HTTP clients with proper user agent strings
//! - Conditional GET requests (If-None-Match / If-Modified-Since)
//! - Retry logic with exponential backoff for transient failures
//! - Outcome classification for the catalog

use crate::catalog::{FetchRecord, FetchStatus};
use crate::config::{HttpConfig, RetryConfig};
use crate::fetch::{RateLimiter, SnapshotMeta, SnapshotStore};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a fetch attempt, classified for the catalog
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 with HTML content; snapshot written
    Fetched {
        http_status: u16,
        content_type: Option<String>,
        etag: Option<String>,
        last_modified: Option<String>,
        content_hash: String,
        snapshot_ref: String,
        body: String,
    },

    /// 304; the previously stored snapshot is still valid
    NotModified,

    /// 404
    NotFound { http_status: u16 },

    /// 2xx but not HTML; nothing stored
    Skipped { content_type: Option<String> },

    /// Terminal failure after retries (network error, 4xx/5xx)
    Failed {
        http_status: Option<u16>,
        error: String,
    },
}

impl FetchOutcome {
    /// Converts the outcome into the row data the catalog stores
    pub fn to_record(&self) -> FetchRecord {
        match self {
            Self::Fetched {
                http_status,
                content_type,
                etag,
                last_modified,
                content_hash,
                snapshot_ref,
                ..
            } => FetchRecord {
                status: FetchStatus::Fetched,
                http_status: Some(*http_status),
                content_type: content_type.clone(),
                etag: etag.clone(),
                last_modified: last_modified.clone(),
                content_hash: Some(content_hash.clone()),
                snapshot_ref: Some(snapshot_ref.clone()),
                error_message: None,
            },
            Self::NotModified => FetchRecord {
                status: FetchStatus::Cached,
                http_status: Some(304),
                ..Default::default()
            },
            Self::NotFound { http_status } => FetchRecord {
                status: FetchStatus::NotFound,
                http_status: Some(*http_status),
                ..Default::default()
            },
            Self::Skipped { content_type } => FetchRecord {
                status: FetchStatus::Skipped,
                content_type: content_type.clone(),
                ..Default::default()
            },
            Self::Failed { http_status, error } => FetchRecord {
                status: FetchStatus::Error,
                http_status: *http_status,
                error_message: Some(error.clone()),
                ..Default::default()
            },
        }
    }
}

/// Cached validators from a previous fetch of the same URL
#[derive(Debug, Clone, Default)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration (user agent, timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited, retrying, snapshot-writing page fetcher
pub struct Fetcher {
    client: Client,
    limiter: RateLimiter,
    snapshots: SnapshotStore,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(
        client: Client,
        limiter: RateLimiter,
        snapshots: SnapshotStore,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            limiter,
            snapshots,
            retry,
        }
    }

    /// Fetches one URL, classifying the result
    ///
    /// Every attempt goes through the rate limiter. Validators from a
    /// previous fetch are sent as conditional headers, so an unchanged
    /// page costs the server a 304 instead of a body. Timeouts, connect
    /// errors, 429 and 5xx responses are retried with exponential
    /// backoff; everything else is terminal on the first response.
    pub async fn fetch(&self, url: &str, validators: &Validators) -> FetchOutcome {
        let mut last_error = String::new();
        let mut last_status: Option<u16> = None;

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(&self.retry, attempt);
                debug!("Retrying {} (attempt {}) after {:?}", url, attempt + 1, delay);
                tokio::time::sleep(delay).await;
            }

            self.limiter.wait().await;

            let mut request = self.client.get(url);
            if let Some(etag) = &validators.etag {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &validators.last_modified {
                request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    if e.is_timeout() || e.is_connect() {
                        last_error = e.to_string();
                        continue;
                    }
                    return FetchOutcome::Failed {
                        http_status: None,
                        error: e.to_string(),
                    };
                }
            };

            let status = response.status();

            if status == StatusCode::NOT_MODIFIED {
                return FetchOutcome::NotModified;
            }

            if status == StatusCode::NOT_FOUND {
                return FetchOutcome::NotFound {
                    http_status: status.as_u16(),
                };
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!("Transient HTTP {} for {}", status.as_u16(), url);
                last_error = format!("HTTP {}", status.as_u16());
                last_status = Some(status.as_u16());
                continue;
            }

            if !status.is_success() {
                return FetchOutcome::Failed {
                    http_status: Some(status.as_u16()),
                    error: format!("HTTP {}", status.as_u16()),
                };
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let is_html = content_type
                .as_deref()
                .map(|ct| ct.contains("text/html"))
                .unwrap_or(false);
            if !is_html {
                return FetchOutcome::Skipped { content_type };
            }

            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let last_modified = response
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    return FetchOutcome::Failed {
                        http_status: Some(status.as_u16()),
                        error: e.to_string(),
                    }
                }
            };

            let content_hash = SnapshotStore::content_hash(body.as_bytes());
            let meta = SnapshotMeta {
                url: url.to_string(),
                fetched_at: Utc::now().to_rfc3339(),
                http_status: status.as_u16(),
                content_type: content_type.clone(),
                content_hash: content_hash.clone(),
            };

            let snapshot_ref = match self.snapshots.store(&body, &meta) {
                Ok(snapshot_ref) => snapshot_ref,
                Err(e) => {
                    return FetchOutcome::Failed {
                        http_status: Some(status.as_u16()),
                        error: format!("snapshot write failed: {}", e),
                    }
                }
            };

            return FetchOutcome::Fetched {
                http_status: status.as_u16(),
                content_type,
                etag,
                last_modified,
                content_hash,
                snapshot_ref,
                body,
            };
        }

        FetchOutcome::Failed {
            http_status: last_status,
            error: format!(
                "giving up after {} attempts: {}",
                self.retry.max_attempts, last_error
            ),
        }
    }
}

/// Delay before retry number `attempt` (1-based): base * 2^(attempt-1)
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u64 << (attempt.saturating_sub(1).min(16));
    Duration::from_millis(retry.base_delay_ms.saturating_mul(factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = retry_config();
        assert_eq!(backoff_delay(&retry, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(&retry, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&retry, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_build_http_client() {
        let config = HttpConfig::default();
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_outcome_to_record_fetched() {
        let outcome = FetchOutcome::Fetched {
            http_status: 200,
            content_type: Some("text/html".to_string()),
            etag: Some("\"v1\"".to_string()),
            last_modified: None,
            content_hash: "abc".to_string(),
            snapshot_ref: "abc.html".to_string(),
            body: "<html></html>".to_string(),
        };
        let record = outcome.to_record();
        assert_eq!(record.status, FetchStatus::Fetched);
        assert_eq!(record.http_status, Some(200));
        assert_eq!(record.snapshot_ref, Some("abc.html".to_string()));
        assert_eq!(record.etag, Some("\"v1\"".to_string()));
    }

    #[test]
    fn test_outcome_to_record_terminal_states() {
        assert_eq!(
            FetchOutcome::NotModified.to_record().status,
            FetchStatus::Cached
        );
        assert_eq!(
            FetchOutcome::NotFound { http_status: 404 }.to_record().status,
            FetchStatus::NotFound
        );
        assert_eq!(
            FetchOutcome::Skipped {
                content_type: Some("application/pdf".to_string())
            }
            .to_record()
            .status,
            FetchStatus::Skipped
        );

        let failed = FetchOutcome::Failed {
            http_status: Some(503),
            error: "HTTP 503".to_string(),
        }
        .to_record();
        assert_eq!(failed.status, FetchStatus::Error);
        assert!(failed.error_message.is_some());
    }
}
