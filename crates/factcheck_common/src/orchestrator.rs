//! Verification orchestrator.
//!
//! Flow for one run:
//! 1. Source match: up to two wire-service searches for the headline
//! 2. Claims in list order, one at a time: plan queries, search until the
//!    plan, the budget or the deadline runs out
//! 3. Evidence selection and verdict reasoning per claim
//! 4. Report with aggregate query count and runtime
//!
//! Invariants:
//! - Every input claim gets exactly one result, in input order
//! - Once the budget or the deadline is exhausted no further searches are
//!   issued for the rest of the run
//! - A failed verdict evaluation downgrades only its own claim

use crate::budget::QueryBudget;
use crate::config::{FactCheckConfig, VerificationConfig};
use crate::confidence;
use crate::error::FactCheckError;
use crate::evidence::{collect_evidence, Allowlist, DomainTrust};
use crate::progress::{ProgressEvent, ProgressStore, RunStage};
use crate::query_planner::plan_queries;
use crate::search::{
    BudgetCharge, HttpSearchTransport, SearchCache, SearchClient, SearchOptions,
};
use crate::types::{
    Claim, Evidence, RunMeta, RunReport, SearchResult, SourceMatch, Verdict, VerificationResult,
};
use crate::verdict::{HttpVerdictReasoner, VerdictReasoner, VerdictRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Budget key used for headline source-match searches
pub const SOURCE_MATCH_CLAIM_ID: &str = "source-match";

const BUDGET_EXCEEDED_NOTE: &str = "verification budget exceeded";
const VERDICT_FAILED_NOTE: &str = "verdict evaluation failed";

/// Wire services tried for the source match, in order: (label, site)
const WIRE_SERVICES: &[(&str, &str)] = &[("reuters", "reuters.com"), ("ap", "apnews.com")];

/// Input to one verification run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactCheckRequest {
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub freshness: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

impl FactCheckRequest {
    pub fn new(claims: Vec<Claim>) -> Self {
        Self {
            claims,
            ..Self::default()
        }
    }

    /// The only semantic check: every claim needs text.
    pub fn validate(&self) -> Result<(), FactCheckError> {
        match self.claims.iter().position(|c| c.text.trim().is_empty()) {
            Some(index) => Err(FactCheckError::InvalidClaim { index }),
            None => Ok(()),
        }
    }
}

/// Lifecycle of a single claim within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Pending,
    Searching,
    BudgetExceeded,
    TimedOut,
    NoResults,
    Evaluated,
    Done,
}

struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    fn expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Mutable state owned by one run.
struct RunContext<'a> {
    deadline: Deadline,
    budget: QueryBudget,
    run_id: Option<&'a str>,
    /// Set once budget or deadline ran out; remaining claims short-circuit
    halted: bool,
}

/// The claim verification engine
pub struct FactChecker {
    search: SearchClient,
    reasoner: Arc<dyn VerdictReasoner>,
    trust: Arc<dyn DomainTrust>,
    config: VerificationConfig,
    allowlist_version: String,
    progress: Option<Arc<ProgressStore>>,
}

impl FactChecker {
    pub fn new(
        search: SearchClient,
        reasoner: Arc<dyn VerdictReasoner>,
        trust: Arc<dyn DomainTrust>,
        config: VerificationConfig,
        allowlist_version: &str,
    ) -> Self {
        Self {
            search,
            reasoner,
            trust,
            config,
            allowlist_version: allowlist_version.to_string(),
            progress: None,
        }
    }

    /// Build the production engine: HTTP search provider, HTTP verdict
    /// model and the flat allowlist, sharing the given cache.
    pub fn from_config(
        config: &FactCheckConfig,
        cache: Arc<SearchCache>,
    ) -> Result<Self, FactCheckError> {
        let transport = HttpSearchTransport::new(&config.search)
            .map_err(|e| FactCheckError::Config(e.to_string()))?;
        let reasoner = HttpVerdictReasoner::new(config.llm.clone())
            .map_err(|e| FactCheckError::Config(e.to_string()))?;
        let search = SearchClient::new(
            Arc::new(transport),
            cache,
            config.search.clone(),
            &config.allowlist.version,
        );
        Ok(Self::new(
            search,
            Arc::new(reasoner),
            Arc::new(Allowlist::from_config(&config.allowlist)),
            config.verification.clone(),
            &config.allowlist.version,
        ))
    }

    pub fn with_progress(mut self, store: Arc<ProgressStore>) -> Self {
        self.progress = Some(store);
        self
    }

    pub fn search_client(&self) -> &SearchClient {
        &self.search
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Verify every claim and assemble the report.
    ///
    /// Fails only on invalid input; budget exhaustion, deadline expiry,
    /// provider failures and malformed verdicts all end up as per-claim
    /// outcomes inside the report.
    pub async fn run(&self, request: &FactCheckRequest) -> Result<RunReport, FactCheckError> {
        request.validate()?;

        let freshness = request
            .freshness
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(self.config.freshness_default.as_str())
            .to_string();

        let mut ctx = RunContext {
            deadline: Deadline::new(self.config.timeout()),
            budget: QueryBudget::new(
                self.config.max_run_queries,
                self.config.max_queries_per_claim,
            ),
            run_id: request.run_id.as_deref().filter(|id| !id.is_empty()),
            halted: false,
        };
        if let (Some(store), Some(run_id)) = (&self.progress, ctx.run_id) {
            store.init(run_id);
        }

        let source_match = self
            .check_source_match(&request.headline, &freshness, &mut ctx)
            .await;

        let mut results = Vec::with_capacity(request.claims.len());
        for (index, claim) in request.claims.iter().enumerate() {
            let result = self.verify_claim(index, claim, &freshness, &mut ctx).await;
            results.push(result);
        }

        let runtime_ms = ctx.deadline.elapsed_ms();
        info!(
            "[FactCheck] queries_used={}/{} runtime_ms={}",
            ctx.budget.total_spent(),
            ctx.budget.max_run_queries(),
            runtime_ms
        );
        if ctx.halted {
            warn!("[FactCheck] verification budget exceeded, remaining claims set to Unverified.");
        }
        self.report(&ctx, RunStage::Run, format!("Fact check done in {} ms", runtime_ms));
        if let (Some(store), Some(run_id)) = (&self.progress, ctx.run_id) {
            store.complete(run_id);
        }

        Ok(RunReport {
            source_match,
            claims: results,
            meta: RunMeta {
                queries_count: ctx.budget.total_spent(),
                runtime_ms,
            },
        })
    }

    /// Look the headline up on wire services. First hit wins; failures are
    /// logged and count as not found.
    async fn check_source_match(
        &self,
        headline: &str,
        freshness: &str,
        ctx: &mut RunContext<'_>,
    ) -> SourceMatch {
        let headline = headline.trim();
        if headline.is_empty() {
            return SourceMatch::skipped();
        }
        self.report(ctx, RunStage::SourceMatch, "Looking for a wire-service source");

        let options =
            SearchOptions::new(3, freshness).with_allowlist_version(&self.allowlist_version);
        for (label, site) in WIRE_SERVICES {
            let query = format!("\"{}\" site:{}", headline, site);
            let charge = BudgetCharge {
                budget: &mut ctx.budget,
                claim_id: SOURCE_MATCH_CLAIM_ID,
            };
            match self.search.search(&query, &options, Some(charge)).await {
                Ok(outcome) => {
                    if let Some(first) = outcome.results.first() {
                        info!("Source match found on {}", site);
                        self.report(ctx, RunStage::SourceMatch, format!("Matched {}", site));
                        return SourceMatch::matched(&first.url, label);
                    }
                }
                Err(e) => warn!("Source match search failed: {}", e),
            }
        }
        self.report(ctx, RunStage::SourceMatch, "No wire-service match");
        SourceMatch::not_found()
    }

    async fn verify_claim(
        &self,
        index: usize,
        claim: &Claim,
        freshness: &str,
        ctx: &mut RunContext<'_>,
    ) -> VerificationResult {
        let mut state = ClaimState::Pending;
        if ctx.deadline.expired() || ctx.budget.is_run_exhausted() {
            ctx.halted = true;
        }
        if ctx.halted {
            debug!("Claim {} short-circuited: {:?} -> {:?}", claim.id, state, ClaimState::Done);
            return budget_exceeded(claim, Vec::new());
        }

        let claim_id = claim.budget_key(index);
        let queries = plan_queries(claim, self.config.max_queries_per_claim as usize);
        self.report(ctx, RunStage::Claim, format!("Checking claim {}", claim_id));

        let options = SearchOptions::new(self.config.results_per_claim, freshness)
            .with_livecrawl("all", "markdown")
            .with_allowlist_version(&self.allowlist_version);

        state = ClaimState::Searching;
        let mut queries_used: Vec<String> = Vec::new();
        let mut aggregated: Vec<SearchResult> = Vec::new();
        for query in &queries {
            if !ctx.budget.can_spend(&claim_id) {
                state = ClaimState::BudgetExceeded;
                break;
            }
            if ctx.deadline.expired() {
                state = ClaimState::TimedOut;
                break;
            }

            self.report(ctx, RunStage::Search, format!("Searching: {}", query));
            let charge = BudgetCharge {
                budget: &mut ctx.budget,
                claim_id: &claim_id,
            };
            match self.search.search(query, &options, Some(charge)).await {
                Ok(outcome) => {
                    queries_used.push(query.clone());
                    aggregated.extend(outcome.results);
                }
                Err(e) => warn!("Search failed for claim {}: {}", claim_id, e),
            }
        }

        if matches!(state, ClaimState::BudgetExceeded | ClaimState::TimedOut) {
            debug!("Claim {} stopped early: {:?}", claim_id, state);
            ctx.halted = true;
            return budget_exceeded(claim, queries_used);
        }

        if aggregated.is_empty() {
            state = ClaimState::NoResults;
            debug!("Claim {} -> {:?}", claim_id, state);
            self.report(ctx, RunStage::Verdict, format!("{}: no search results", claim_id));
            return VerificationResult {
                id: claim.id.clone(),
                claim: claim.text.clone(),
                verdict: Verdict::Unverified,
                confidence: 25,
                key_evidence: Vec::new(),
                reasoning_short: "No search results returned.".to_string(),
                queries_used,
                notes: String::new(),
            };
        }

        let evidence = collect_evidence(
            &aggregated,
            self.trust.as_ref(),
            self.config.max_sources_per_claim,
        );
        let result = self.evaluate(claim, &aggregated, evidence, queries_used).await;
        state = ClaimState::Evaluated;
        debug!("Claim {} -> {:?} ({})", claim_id, state, result.verdict);
        self.report(
            ctx,
            RunStage::Verdict,
            format!("{}: {} ({})", claim_id, result.verdict, result.confidence),
        );
        result
    }

    async fn evaluate(
        &self,
        claim: &Claim,
        aggregated: &[SearchResult],
        evidence: Vec<Evidence>,
        queries_used: Vec<String>,
    ) -> VerificationResult {
        let allowed_sources = self.trust.describe();
        let request = VerdictRequest {
            claim: &claim.text,
            results: aggregated,
            allowed_sources: &allowed_sources,
        };

        let (verdict, confidence, reasoning_short, notes) =
            match self.reasoner.evaluate(&request).await {
                Ok(assessment) => {
                    let reasoning = if assessment.reasoning_short.is_empty() {
                        "Verdict determined from evidence.".to_string()
                    } else {
                        assessment.reasoning_short
                    };
                    (
                        assessment.verdict,
                        confidence::score(assessment.verdict, assessment.directness, evidence.len()),
                        reasoning,
                        String::new(),
                    )
                }
                Err(e) => {
                    warn!("Verdict evaluation failed for claim {}: {}", claim.id, e);
                    (
                        Verdict::Unverified,
                        confidence::score(Verdict::Unverified, 0.0, evidence.len()),
                        "Verdict could not be determined.".to_string(),
                        VERDICT_FAILED_NOTE.to_string(),
                    )
                }
            };

        VerificationResult {
            id: claim.id.clone(),
            claim: claim.text.clone(),
            verdict,
            confidence,
            key_evidence: evidence,
            reasoning_short,
            queries_used,
            notes,
        }
    }

    fn report(&self, ctx: &RunContext<'_>, stage: RunStage, message: impl Into<String>) {
        if let (Some(store), Some(run_id)) = (&self.progress, ctx.run_id) {
            store.push(run_id, ProgressEvent::new(stage, message, ctx.deadline.elapsed_ms()));
        }
    }
}

fn budget_exceeded(claim: &Claim, queries_used: Vec<String>) -> VerificationResult {
    VerificationResult {
        id: claim.id.clone(),
        claim: claim.text.clone(),
        verdict: Verdict::Unverified,
        confidence: 20,
        key_evidence: Vec::new(),
        reasoning_short: "Verification budget exceeded.".to_string(),
        queries_used,
        notes: BUDGET_EXCEEDED_NOTE.to_string(),
    }
}
