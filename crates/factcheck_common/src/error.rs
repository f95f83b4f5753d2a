//! Error types for the verification engine.

use thiserror::Error;

/// Failures surfaced by the search client.
///
/// Retryable provider failures (429, 5xx) never show up here: they degrade
/// to an empty result set with an attached error message instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search provider rejected request with HTTP {status}{}: {body}", request_id_suffix(.request_id))]
    Rejected {
        status: u16,
        request_id: Option<String>,
        body: String,
    },

    #[error("Search transport failed: {0}")]
    Transport(String),

    #[error("Search configuration error: {0}")]
    Config(String),
}

fn request_id_suffix(request_id: &Option<String>) -> String {
    match request_id {
        Some(id) if !id.is_empty() => format!(" (request-id {})", id),
        _ => String::new(),
    }
}

/// Low-level transport failures. Both variants are transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// Failures from the verdict reasoning collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerdictError {
    #[error("Verdict reasoning is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Model returned empty response")]
    EmptyResponse,

    #[error("{label} returned invalid JSON (starts with: {raw_prefix})")]
    InvalidJson { label: String, raw_prefix: String },
}

/// Run-level failures. Only input validation can fail a whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactCheckError {
    #[error("Claim at index {index} has empty claim text")]
    InvalidClaim { index: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_includes_request_id() {
        let err = SearchError::Rejected {
            status: 403,
            request_id: Some("abc".to_string()),
            body: "forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Search provider rejected request with HTTP 403 (request-id abc): forbidden"
        );
    }

    #[test]
    fn test_rejected_message_without_request_id() {
        let err = SearchError::Rejected {
            status: 400,
            request_id: None,
            body: "bad".to_string(),
        };
        assert!(!err.to_string().contains("request-id"));
    }
}
