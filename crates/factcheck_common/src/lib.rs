//! Claim verification engine shared by the fact-check daemon and CLI.
//! v0.4.0: Search cache keyed by allowlist version, degraded livecrawl retry.

pub mod budget;
pub mod confidence;
pub mod config;
pub mod error;
pub mod evidence;
pub mod orchestrator;
pub mod progress;
pub mod query_planner;
pub mod search;
pub mod session_cache;
pub mod types;
pub mod verdict;

pub use budget::QueryBudget;
pub use config::FactCheckConfig;
pub use error::{FactCheckError, SearchError, TransportError, VerdictError};
pub use evidence::{collect_evidence, Allowlist, DomainTrust};
pub use orchestrator::{ClaimState, FactCheckRequest, FactChecker};
pub use progress::{ProgressEvent, ProgressSnapshot, ProgressStore, RunStage};
pub use query_planner::plan_queries;
pub use search::{SearchCache, SearchClient, SearchOptions, SearchOutcome};
pub use session_cache::{build_cache_key, SessionCache};
pub use types::{
    Claim, Evidence, RunMeta, RunReport, SearchResult, SourceMatch, SourceMatchStatus, Verdict,
    VerificationResult,
};
pub use verdict::{FakeVerdictReasoner, HttpVerdictReasoner, VerdictReasoner};

/// Crate version, reported by the daemon health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
