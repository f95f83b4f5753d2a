//! Web search: provider transport, response normalization and the
//! caching/retrying client the orchestrator talks to.

pub mod client;
pub mod normalize;
pub mod transport;

pub use client::{BudgetCharge, SearchCache, SearchClient, SearchOptions, SearchOutcome};
pub use normalize::{extract_results, normalize_body, normalize_result};
pub use transport::{
    FakeSearchTransport, HttpSearchTransport, SearchRequest, SearchTransport, TransportResponse,
};
