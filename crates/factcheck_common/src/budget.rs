//! Query budget for a single verification run.
//!
//! Tracks spend against a run-wide cap and a per-claim cap. The allocator
//! only reports; callers check `can_spend` before `spend`. Not shared
//! between tasks: a run owns its budget exclusively.

use serde::Serialize;
use std::collections::HashMap;

/// Run-scoped query counters.
#[derive(Debug, Clone, Serialize)]
pub struct QueryBudget {
    max_run_queries: u32,
    max_queries_per_claim: u32,
    total_spent: u32,
    per_claim_spent: HashMap<String, u32>,
}

impl QueryBudget {
    pub fn new(max_run_queries: u32, max_queries_per_claim: u32) -> Self {
        Self {
            max_run_queries,
            max_queries_per_claim,
            total_spent: 0,
            per_claim_spent: HashMap::new(),
        }
    }

    /// True while both the run cap and this claim's cap have room.
    pub fn can_spend(&self, claim_id: &str) -> bool {
        self.total_spent < self.max_run_queries
            && self.spent_for(claim_id) < self.max_queries_per_claim
    }

    /// Record one query. Unconditional.
    pub fn spend(&mut self, claim_id: &str) {
        self.total_spent += 1;
        *self.per_claim_spent.entry(claim_id.to_string()).or_insert(0) += 1;
    }

    /// No claim can spend any more.
    pub fn is_run_exhausted(&self) -> bool {
        self.total_spent >= self.max_run_queries
    }

    pub fn total_spent(&self) -> u32 {
        self.total_spent
    }

    pub fn spent_for(&self, claim_id: &str) -> u32 {
        self.per_claim_spent.get(claim_id).copied().unwrap_or(0)
    }

    pub fn max_run_queries(&self) -> u32 {
        self.max_run_queries
    }

    pub fn remaining(&self) -> u32 {
        self.max_run_queries.saturating_sub(self.total_spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_claim_cap() {
        let mut budget = QueryBudget::new(10, 2);
        assert!(budget.can_spend("c1"));
        budget.spend("c1");
        budget.spend("c1");
        assert!(!budget.can_spend("c1"));
        assert!(budget.can_spend("c2"));
        assert_eq!(budget.spent_for("c1"), 2);
        assert_eq!(budget.spent_for("c2"), 0);
    }

    #[test]
    fn test_run_cap() {
        let mut budget = QueryBudget::new(3, 5);
        budget.spend("c1");
        budget.spend("c2");
        budget.spend("c3");
        assert!(budget.is_run_exhausted());
        assert!(!budget.can_spend("c4"));
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_guarded_spend_never_exceeds_caps() {
        let mut budget = QueryBudget::new(7, 3);
        for round in 0..20 {
            let claim = format!("c{}", round % 4);
            if budget.can_spend(&claim) {
                budget.spend(&claim);
            }
        }
        assert_eq!(budget.total_spent(), 7);
        for i in 0..4 {
            assert!(budget.spent_for(&format!("c{}", i)) <= 3);
        }
    }
}
