//! Search client: cache, budget, retry and degraded-retry policy around a
//! [`SearchTransport`].
//!
//! Order of operations for one `search` call:
//! 1. cache hit returns immediately and costs nothing
//! 2. a denied budget returns an empty `budget_exceeded` outcome
//! 3. one unit of budget is spent, then attempts begin
//! 4. 429/5xx and transport failures retry with linear backoff; the first
//!    5xx on a livecrawl request retries once without livecrawl. Both kinds
//!    of retry share the same `max_retries` cap
//! 5. successes are normalized and cached

use super::normalize::normalize_body;
use super::transport::{SearchRequest, SearchTransport, TransportResponse};
use crate::budget::QueryBudget;
use crate::config::SearchConfig;
use crate::error::{SearchError, TransportError};
use crate::session_cache::{build_cache_key, SessionCache};
use crate::types::SearchResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache shared by all search clients in the process.
pub type SearchCache = SessionCache<Vec<SearchResult>>;

/// Per-call search options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub count: u32,
    pub freshness: String,
    pub livecrawl: Option<String>,
    pub livecrawl_formats: Option<String>,
    /// Cache-key salt; empty means the client's default version
    pub allowlist_version: String,
}

impl SearchOptions {
    pub fn new(count: u32, freshness: &str) -> Self {
        Self {
            count,
            freshness: freshness.to_string(),
            livecrawl: None,
            livecrawl_formats: None,
            allowlist_version: String::new(),
        }
    }

    pub fn with_livecrawl(mut self, livecrawl: &str, formats: &str) -> Self {
        self.livecrawl = Some(livecrawl.to_string());
        self.livecrawl_formats = Some(formats.to_string());
        self
    }

    pub fn with_allowlist_version(mut self, version: &str) -> Self {
        self.allowlist_version = version.to_string();
        self
    }
}

/// Budget to charge for a call, and the claim it is charged to.
pub struct BudgetCharge<'a> {
    pub budget: &'a mut QueryBudget,
    pub claim_id: &'a str,
}

/// Result of one search call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub cached: bool,
    pub budget_exceeded: bool,
    /// Set when retryable failures were exhausted or the body was unreadable
    pub error: Option<String>,
}

impl SearchOutcome {
    fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Self::default()
        }
    }
}

/// Provider client with caching and retry policy
pub struct SearchClient {
    transport: Arc<dyn SearchTransport>,
    cache: Arc<SearchCache>,
    config: SearchConfig,
    default_allowlist_version: String,
}

impl SearchClient {
    pub fn new(
        transport: Arc<dyn SearchTransport>,
        cache: Arc<SearchCache>,
        config: SearchConfig,
        default_allowlist_version: &str,
    ) -> Self {
        Self {
            transport,
            cache,
            config,
            default_allowlist_version: default_allowlist_version.to_string(),
        }
    }

    pub fn cache(&self) -> &Arc<SearchCache> {
        &self.cache
    }

    /// Run one search.
    ///
    /// Non-retryable 4xx responses come back as [`SearchError::Rejected`];
    /// transport failures that survive every retry come back as
    /// [`SearchError::Transport`]. Exhausted 429/5xx retries are not errors:
    /// they yield an empty outcome carrying the failure message.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        charge: Option<BudgetCharge<'_>>,
    ) -> Result<SearchOutcome, SearchError> {
        let version = if options.allowlist_version.is_empty() {
            self.default_allowlist_version.as_str()
        } else {
            options.allowlist_version.as_str()
        };
        let cache_key = build_cache_key(query, &options.freshness, version);

        if let Some(results) = self.cache.get(&cache_key) {
            debug!("Search cache hit for {:?}", query);
            return Ok(SearchOutcome {
                query: query.to_string(),
                results,
                cached: true,
                ..SearchOutcome::default()
            });
        }

        if let Some(charge) = charge {
            if !charge.budget.can_spend(charge.claim_id) {
                debug!("Budget denied search for claim {}", charge.claim_id);
                return Ok(SearchOutcome {
                    budget_exceeded: true,
                    ..SearchOutcome::empty(query)
                });
            }
            charge.budget.spend(charge.claim_id);
        }

        let mut request = SearchRequest {
            query: query.to_string(),
            count: options.count,
            freshness: options.freshness.clone(),
            livecrawl: options.livecrawl.clone(),
            livecrawl_formats: options.livecrawl_formats.clone(),
        };

        let mut attempt: u32 = 0;
        let mut tried_degraded = false;
        loop {
            match self.transport.get(&request).await {
                Ok(response) if response.is_success() => {
                    return Ok(self.finish(query, &cache_key, &response));
                }
                Ok(response) => {
                    if !tried_degraded
                        && response.status >= 500
                        && request.livecrawl.is_some()
                        && attempt < self.config.max_retries
                    {
                        tried_degraded = true;
                        request.livecrawl = None;
                        request.livecrawl_formats = None;
                        request.count = request.count.min(self.config.degraded_count);
                        attempt += 1;
                        warn!(
                            "Search HTTP {} with livecrawl, retrying degraded (count={})",
                            response.status, request.count
                        );
                        self.backoff(attempt).await;
                        continue;
                    }
                    if response.is_retryable() && attempt < self.config.max_retries {
                        attempt += 1;
                        warn!("Search HTTP {}, retry {}", response.status, attempt);
                        self.backoff(attempt).await;
                        continue;
                    }

                    let message = describe_failure(&response);
                    warn!("Search failed for {:?}: {}", query, message);
                    if response.is_retryable() {
                        return Ok(SearchOutcome {
                            error: Some(message),
                            ..SearchOutcome::empty(query)
                        });
                    }
                    return Err(SearchError::Rejected {
                        status: response.status,
                        request_id: response.request_id,
                        body: response.body,
                    });
                }
                Err(err) => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        warn!("Search transport error ({}), retry {}", err, attempt);
                        self.backoff(attempt).await;
                        continue;
                    }
                    warn!("Search failed for {:?}: {}", query, err);
                    return Err(transport_failure(err));
                }
            }
        }
    }

    fn finish(&self, query: &str, cache_key: &str, response: &TransportResponse) -> SearchOutcome {
        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(body) => {
                let results = normalize_body(&body);
                self.cache.set(cache_key, results.clone());
                SearchOutcome {
                    query: query.to_string(),
                    results,
                    ..SearchOutcome::default()
                }
            }
            Err(e) => {
                warn!("Search response for {:?} is not JSON: {}", query, e);
                SearchOutcome {
                    error: Some(format!("invalid response body: {}", e)),
                    ..SearchOutcome::empty(query)
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.config.backoff_ms.saturating_mul(u64::from(attempt));
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

fn describe_failure(response: &TransportResponse) -> String {
    let mut message = format!("Search provider error {}", response.status);
    if let Some(id) = response.request_id.as_deref().filter(|id| !id.is_empty()) {
        message.push_str(&format!(" (request-id {})", id));
    }
    if !response.body.is_empty() {
        message.push_str(": ");
        message.push_str(&response.body);
    }
    message
}

fn transport_failure(err: TransportError) -> SearchError {
    SearchError::Transport(err.to_string())
}
