//! Core data model for claim verification.
//!
//! Claims come from the upstream claim picker; everything else here is
//! produced by the engine and ends up inside a [`RunReport`].

use serde::{Deserialize, Serialize};

/// A single checkable statement extracted from an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub id: String,
    /// The claim text itself
    #[serde(default, rename = "claim")]
    pub text: String,
    #[serde(default, rename = "claim_type")]
    pub kind: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub time_scope: String,
    #[serde(default)]
    pub recommended_queries: Vec<String>,
    /// Extra query suggested by the caller, tried after the recommended ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_hint: Option<String>,
}

impl Claim {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn with_queries(mut self, queries: &[&str]) -> Self {
        self.recommended_queries = queries.iter().map(|q| q.to_string()).collect();
        self
    }

    /// Identifier used for budget accounting. Claims without an id get a
    /// positional one so per-claim caps still apply.
    pub fn budget_key(&self, index: usize) -> String {
        if self.id.trim().is_empty() {
            format!("c{}", index)
        } else {
            self.id.clone()
        }
    }
}

/// Provider search hit after normalization. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub date: String,
    pub content_markdown_if_any: String,
}

impl SearchResult {
    pub fn from_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Best available body text: crawled markdown first, then the snippet.
    pub fn body_text(&self) -> &str {
        if self.content_markdown_if_any.is_empty() {
            &self.snippet
        } else {
            &self.content_markdown_if_any
        }
    }
}

/// Admissible excerpt cited for a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub url: String,
    pub title: String,
    pub source_domain: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Supported,
    Contradicted,
    Unverified,
}

impl Verdict {
    /// Case-insensitive parse; anything unrecognized is `Unverified`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "supported" => Self::Supported,
            "contradicted" => Self::Contradicted,
            _ => Self::Unverified,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supported => write!(f, "Supported"),
            Self::Contradicted => write!(f, "Contradicted"),
            Self::Unverified => write!(f, "Unverified"),
        }
    }
}

/// Per-claim outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: String,
    pub claim: String,
    pub verdict: Verdict,
    pub confidence: u8,
    pub key_evidence: Vec<Evidence>,
    pub reasoning_short: String,
    pub queries_used: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMatchStatus {
    Skipped,
    NotFound,
    Matched,
}

/// Whether the headline maps to a canonical wire-service article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMatch {
    pub status: SourceMatchStatus,
    pub canonical_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SourceMatch {
    pub fn skipped() -> Self {
        Self {
            status: SourceMatchStatus::Skipped,
            canonical_url: String::new(),
            source: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: SourceMatchStatus::NotFound,
            canonical_url: String::new(),
            source: None,
        }
    }

    pub fn matched(canonical_url: &str, source: &str) -> Self {
        Self {
            status: SourceMatchStatus::Matched,
            canonical_url: canonical_url.to_string(),
            source: Some(source.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub queries_count: u32,
    pub runtime_ms: u64,
}

/// The engine's only output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub source_match: SourceMatch,
    pub claims: Vec<VerificationResult>,
    pub meta: RunMeta,
}
