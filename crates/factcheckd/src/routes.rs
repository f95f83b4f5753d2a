//! API routes for factcheckd

use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use factcheck_common::{FactCheckError, FactCheckRequest, ProgressSnapshot, RunReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Fact-check Routes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct FactCheckResponse {
    pub run_id: String,
    pub report: RunReport,
}

pub fn factcheck_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/factcheck", post(run_factcheck))
}

async fn run_factcheck(
    State(state): State<AppStateArc>,
    Json(mut req): Json<FactCheckRequest>,
) -> Result<Json<FactCheckResponse>, (StatusCode, String)> {
    let run_id = req
        .run_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    req.run_id = Some(run_id.clone());
    info!("  Fact check {}: {} claim(s)", run_id, req.claims.len());

    match state.checker.run(&req).await {
        Ok(report) => Ok(Json(FactCheckResponse { run_id, report })),
        Err(e @ FactCheckError::InvalidClaim { .. }) => {
            warn!("  Rejected fact check {}: {}", run_id, e);
            state.progress.fail(&run_id, &e.to_string());
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            state.progress.fail(&run_id, &e.to_string());
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// ============================================================================
// Progress Routes
// ============================================================================

pub fn progress_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/progress/:run_id", get(get_progress))
}

async fn get_progress(
    State(state): State<AppStateArc>,
    Path(run_id): Path<String>,
) -> Json<ProgressSnapshot> {
    Json(state.progress.get(&run_id))
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub cache_entries: usize,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: factcheck_common::VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cache_entries: state.cache.len(),
    })
}
