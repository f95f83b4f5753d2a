//! Search transport abstraction.
//!
//! The search client owns retry, cache and budget policy; a transport only
//! performs one HTTP attempt. Production code uses [`HttpSearchTransport`];
//! tests use [`FakeSearchTransport`] with scripted responses.

use crate::config::SearchConfig;
use crate::error::{SearchError, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One provider request, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub count: u32,
    pub freshness: String,
    pub livecrawl: Option<String>,
    pub livecrawl_formats: Option<String>,
}

impl SearchRequest {
    /// Query string parameters in wire order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("query", self.query.clone()), ("count", self.count.to_string())];
        if !self.freshness.is_empty() {
            params.push(("freshness", self.freshness.clone()));
        }
        if let Some(livecrawl) = &self.livecrawl {
            params.push(("livecrawl", livecrawl.clone()));
        }
        if let Some(formats) = &self.livecrawl_formats {
            params.push(("livecrawl_formats", formats.clone()));
        }
        params
    }
}

/// Status and body of a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub request_id: Option<String>,
}

impl TransportResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            request_id: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            request_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 429 and every 5xx are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..=599).contains(&self.status)
    }
}

/// Trait abstraction for a single provider attempt
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn get(&self, request: &SearchRequest) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// HTTP Transport (Production)
// ============================================================================

/// reqwest-backed transport. Every attempt is bounded by the configured
/// request timeout; hitting it reports [`TransportError::Timeout`].
pub struct HttpSearchTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpSearchTransport {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SearchError::Config("Missing YOU_API_KEY".to_string()))?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    async fn attempt(&self, request: &SearchRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&request.params())
            .header("X-API-Key", &self.api_key)
            .header("Accept-Encoding", "identity")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify)?;

        Ok(TransportResponse {
            status,
            body,
            request_id,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl SearchTransport for HttpSearchTransport {
    async fn get(&self, request: &SearchRequest) -> Result<TransportResponse, TransportError> {
        match tokio::time::timeout(self.timeout, self.attempt(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

// ============================================================================
// Fake Transport (Testing)
// ============================================================================

/// Scripted transport. Responses are consumed in order; once the script runs
/// out every further attempt fails with a network error.
pub struct FakeSearchTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<SearchRequest>>,
    delay: Duration,
}

impl FakeSearchTransport {
    pub fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Make every attempt take `delay` before it answers.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A transport that answers every request with the same body.
    pub fn always(body: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(TransportResponse::ok(body))).collect())
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl SearchTransport for FakeSearchTransport {
    async fn get(&self, request: &SearchRequest) -> Result<TransportResponse, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_skip_unset_fields() {
        let request = SearchRequest {
            query: "q".to_string(),
            count: 3,
            freshness: String::new(),
            livecrawl: None,
            livecrawl_formats: None,
        };
        let names: Vec<&str> = request.params().iter().map(|(k, _)| *k).collect();
        assert_eq!(names, vec!["query", "count"]);
    }

    #[test]
    fn test_params_include_livecrawl() {
        let request = SearchRequest {
            query: "q".to_string(),
            count: 12,
            freshness: "month".to_string(),
            livecrawl: Some("all".to_string()),
            livecrawl_formats: Some("markdown".to_string()),
        };
        let params = request.params();
        assert_eq!(params.len(), 5);
        assert_eq!(params[4], ("livecrawl_formats", "markdown".to_string()));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(TransportResponse::status(429).is_retryable());
        assert!(TransportResponse::status(503).is_retryable());
        assert!(!TransportResponse::status(404).is_retryable());
        assert!(!TransportResponse::status(200).is_retryable());
        assert!(TransportResponse::status(204).is_success());
    }

    #[test]
    fn test_http_transport_requires_api_key() {
        let config = SearchConfig::default();
        assert!(matches!(
            HttpSearchTransport::new(&config),
            Err(SearchError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_fake_transport_replays_script() {
        let fake = FakeSearchTransport::new(vec![
            Ok(TransportResponse::status(503)),
            Err(TransportError::Timeout),
        ]);
        let request = SearchRequest {
            query: "q".to_string(),
            count: 1,
            freshness: String::new(),
            livecrawl: None,
            livecrawl_formats: None,
        };
        assert_eq!(fake.get(&request).await.unwrap().status, 503);
        assert_eq!(fake.get(&request).await, Err(TransportError::Timeout));
        assert!(matches!(fake.get(&request).await, Err(TransportError::Network(_))));
        assert_eq!(fake.call_count(), 3);
    }
}
