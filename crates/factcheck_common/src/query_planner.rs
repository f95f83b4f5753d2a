//! Query planning: one claim in, an ordered list of search queries out.
//!
//! Precise queries go first so budget is spent on them before the generic
//! widening fallbacks.

use crate::types::Claim;

/// Plan up to `max_queries` distinct, non-empty queries for a claim.
///
/// Order: recommended queries, the query hint, the bare claim text, then
/// `"<claim> official"` and `"<claim> report"` while under the cap.
pub fn plan_queries(claim: &Claim, max_queries: usize) -> Vec<String> {
    let base = claim.text.trim();

    let mut candidates: Vec<&str> = claim
        .recommended_queries
        .iter()
        .map(String::as_str)
        .collect();
    if let Some(hint) = claim.query_hint.as_deref() {
        candidates.push(hint);
    }
    candidates.push(base);

    let mut planned: Vec<String> = Vec::new();
    for candidate in candidates {
        let query = candidate.trim();
        if query.is_empty() || planned.iter().any(|q| q == query) {
            continue;
        }
        planned.push(query.to_string());
    }

    if !base.is_empty() {
        for suffix in ["official", "report"] {
            let fallback = format!("{} {}", base, suffix);
            if planned.len() < max_queries && !planned.contains(&fallback) {
                planned.push(fallback);
            }
        }
    }

    planned.truncate(max_queries);
    planned
}
