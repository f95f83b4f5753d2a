//! HTTP server for factcheckd

use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use factcheck_common::{FactChecker, ProgressStore, SearchCache};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Article payloads can be large; anything bigger is refused.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Headroom on top of the verification deadline before the HTTP layer
/// gives up on a request.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(30);

/// Application state shared across handlers
pub struct AppState {
    pub checker: FactChecker,
    pub progress: Arc<ProgressStore>,
    pub cache: Arc<SearchCache>,
    pub start_time: Instant,
}

impl AppState {
    /// The checker should already report into `progress`.
    pub fn new(checker: FactChecker, progress: Arc<ProgressStore>, cache: Arc<SearchCache>) -> Self {
        Self {
            checker,
            progress,
            cache,
            start_time: Instant::now(),
        }
    }
}

/// Build the router with all layers applied.
pub fn router(state: Arc<AppState>) -> Router {
    let request_timeout = state.checker.config().timeout() + REQUEST_TIMEOUT_SLACK;

    Router::new()
        .merge(routes::factcheck_routes())
        .merge(routes::progress_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until ctrl-c.
pub async fn run(state: AppState, bind: &str) -> Result<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("  Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down gracefully");
    }
}
