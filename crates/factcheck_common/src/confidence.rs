//! Confidence scoring.
//!
//! Pure function of verdict, directness and evidence count. Corroboration
//! across domains and precise evidence raise the score; unverifiable claims
//! are capped below what a decided claim can reach.

use crate::types::Verdict;

/// Ceiling for `Unverified` claims
pub const UNVERIFIED_CAP: i64 = 45;

/// Score in `[0, 100]`.
pub fn score(verdict: Verdict, directness: f64, evidence_count: usize) -> u8 {
    let base: i64 = if verdict == Verdict::Unverified { 20 } else { 40 };
    let corroboration = (evidence_count as i64 - 1).min(2) * 10;
    let directness = if directness.is_nan() {
        0.0
    } else {
        directness.clamp(0.0, 1.0)
    };
    let precision = (directness * 20.0).round() as i64;

    let mut total = base + corroboration + precision;
    if verdict == Verdict::Unverified {
        total = total.min(UNVERIFIED_CAP);
    }
    total.clamp(0, 100) as u8
}
