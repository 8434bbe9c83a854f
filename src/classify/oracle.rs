//! The classification oracle boundary
//!
//! The oracle is an external service that assigns a classification to a
//! batch of sibling pages given their parent's classification and page
//! descriptors. The engine treats the classification payload as opaque
//! JSON; only the wire envelope is validated.

use crate::config::OracleConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors from the oracle boundary
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// The already-classified parent of a sibling group, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentContext {
    pub url: String,
    pub depth: u32,
    pub classification: Option<serde_json::Value>,
}

/// What the oracle sees of one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub url: String,
    pub depth: u32,
    pub child_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// One classification request: a sibling batch plus shared context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentContext>,
    pub pages: Vec<PageDescriptor>,
}

/// The oracle's verdict for one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageClassification {
    pub url: String,
    pub classification: serde_json::Value,
    pub confidence: f64,
}

/// One classification response, with the call's token cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    pub classifications: Vec<PageClassification>,
    pub tokens_used: u64,
}

/// A backend that classifies batches of pages
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn classify(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// Checks a response against the request it answers
///
/// Every requested URL must appear exactly once, no extra URLs may
/// appear, and confidence must be in [0, 1].
pub fn validate_response(
    request: &OracleRequest,
    response: &OracleResponse,
) -> Result<(), OracleError> {
    let requested: HashSet<&str> = request.pages.iter().map(|p| p.url.as_str()).collect();
    let mut answered: HashSet<&str> = HashSet::new();

    for item in &response.classifications {
        if !requested.contains(item.url.as_str()) {
            return Err(OracleError::InvalidResponse(format!(
                "unrequested url in response: {}",
                item.url
            )));
        }
        if !answered.insert(item.url.as_str()) {
            return Err(OracleError::InvalidResponse(format!(
                "duplicate url in response: {}",
                item.url
            )));
        }
        if !(0.0..=1.0).contains(&item.confidence) {
            return Err(OracleError::InvalidResponse(format!(
                "confidence out of range for {}: {}",
                item.url, item.confidence
            )));
        }
    }

    if answered.len() != requested.len() {
        return Err(OracleError::InvalidResponse(format!(
            "response covers {} of {} requested urls",
            answered.len(),
            requested.len()
        )));
    }

    Ok(())
}

/// Oracle backed by an HTTP classification endpoint
///
/// Posts the request envelope as JSON and expects the response envelope
/// back. Any transport or schema problem surfaces as an [`OracleError`]
/// for the classifier's retry logic to handle.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn classify(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let parsed: OracleResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_for(urls: &[&str]) -> OracleRequest {
        OracleRequest {
            parent: None,
            pages: urls
                .iter()
                .map(|url| PageDescriptor {
                    url: url.to_string(),
                    depth: 1,
                    child_count: 0,
                    title: None,
                    heading: None,
                    excerpt: None,
                })
                .collect(),
        }
    }

    fn response_for(urls: &[&str], tokens: u64) -> OracleResponse {
        OracleResponse {
            classifications: urls
                .iter()
                .map(|url| PageClassification {
                    url: url.to_string(),
                    classification: json!({"category": "page"}),
                    confidence: 0.8,
                })
                .collect(),
            tokens_used: tokens,
        }
    }

    #[test]
    fn test_validate_accepts_exact_cover() {
        let request = request_for(&["https://a.com/1", "https://a.com/2"]);
        let response = response_for(&["https://a.com/2", "https://a.com/1"], 100);
        assert!(validate_response(&request, &response).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_url() {
        let request = request_for(&["https://a.com/1", "https://a.com/2"]);
        let response = response_for(&["https://a.com/1"], 100);
        assert!(validate_response(&request, &response).is_err());
    }

    #[test]
    fn test_validate_rejects_extra_url() {
        let request = request_for(&["https://a.com/1"]);
        let response = response_for(&["https://a.com/1", "https://a.com/extra"], 100);
        assert!(validate_response(&request, &response).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_url() {
        let request = request_for(&["https://a.com/1"]);
        let response = response_for(&["https://a.com/1", "https://a.com/1"], 100);
        assert!(validate_response(&request, &response).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let request = request_for(&["https://a.com/1"]);
        let mut response = response_for(&["https://a.com/1"], 100);
        response.classifications[0].confidence = 1.5;
        assert!(validate_response(&request, &response).is_err());
    }

    #[test]
    fn test_request_serialization_shape() {
        let mut request = request_for(&["https://a.com/1"]);
        request.parent = Some(ParentContext {
            url: "https://a.com/".to_string(),
            depth: 0,
            classification: Some(json!({"category": "root"})),
        });

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["parent"]["url"], "https://a.com/");
        assert_eq!(value["pages"][0]["url"], "https://a.com/1");
        // Absent descriptors are omitted from the wire form
        assert!(value["pages"][0].get("title").is_none());
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{
            "classifications": [
                {"url": "https://a.com/1", "classification": {"category": "essay"}, "confidence": 0.9}
            ],
            "tokens_used": 420
        }"#;
        let response: OracleResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.tokens_used, 420);
        assert_eq!(response.classifications[0].classification["category"], "essay");
    }
}
