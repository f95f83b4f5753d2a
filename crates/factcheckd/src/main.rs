//! factcheckd - claim verification daemon
//!
//! Serves the verification engine over HTTP. One search cache and one
//! progress store live for the whole process and are shared by all runs.

use anyhow::{Context, Result};
use factcheck_common::{FactCheckConfig, FactChecker, ProgressStore, SearchCache};
use factcheckd::server::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("factcheckd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = FactCheckConfig::load().context("Failed to load configuration")?;
    info!(
        "  Budget: {} queries/run, {} per claim, {} ms deadline",
        config.verification.max_run_queries,
        config.verification.max_queries_per_claim,
        config.verification.timeout_ms
    );

    let cache = Arc::new(SearchCache::new(
        Duration::from_millis(config.cache.ttl_ms),
        config.cache.max_entries,
    ));
    let progress = Arc::new(ProgressStore::new());
    let checker = FactChecker::from_config(&config, cache.clone())
        .context("Failed to initialize fact checker")?
        .with_progress(progress.clone());

    let state = AppState::new(checker, progress, cache);
    server::run(state, &config.server.bind).await
}
