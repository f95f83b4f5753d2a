//! Command implementations

use crate::output;
use anyhow::{Context, Result};
use factcheck_common::{
    plan_queries, Claim, FactCheckConfig, FactCheckRequest, FactChecker, SearchCache,
};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Accepted claims file layouts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClaimsFile {
    Wrapped { claims: Vec<Claim> },
    Bare(Vec<Claim>),
}

impl ClaimsFile {
    fn into_claims(self) -> Vec<Claim> {
        match self {
            Self::Wrapped { claims } | Self::Bare(claims) => claims,
        }
    }
}

fn parse_claims(contents: &str) -> Result<Vec<Claim>> {
    let file: ClaimsFile =
        serde_json::from_str(contents).context("Expected {\"claims\": [...]} or a JSON array")?;
    Ok(file.into_claims())
}

fn load_claims(path: &Path) -> Result<Vec<Claim>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_claims(&contents).with_context(|| format!("Invalid claims file {}", path.display()))
}

pub async fn check(
    claims_path: &Path,
    headline: Option<String>,
    freshness: Option<String>,
    json: bool,
) -> Result<()> {
    let config = FactCheckConfig::load()?;
    let claims = load_claims(claims_path)?;

    let cache = Arc::new(SearchCache::new(
        Duration::from_millis(config.cache.ttl_ms),
        config.cache.max_entries,
    ));
    let checker = FactChecker::from_config(&config, cache)?;

    let request = FactCheckRequest {
        claims,
        headline: headline.unwrap_or_default(),
        freshness,
        run_id: None,
    };
    let report = checker.run(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::display_report(&report);
    }
    Ok(())
}

pub fn plan(claims_path: &Path) -> Result<()> {
    let config = FactCheckConfig::load()?;
    let claims = load_claims(claims_path)?;
    let max_queries = config.verification.max_queries_per_claim as usize;

    for (index, claim) in claims.iter().enumerate() {
        output::display_plan(&claim.budget_key(index), &claim.text, &plan_queries(claim, max_queries));
    }
    Ok(())
}

pub fn config() -> Result<()> {
    let config = FactCheckConfig::load()?;
    let rendered =
        toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
