//! # Health Probes
//!
//! Unauthenticated liveness endpoint for orchestration.

use axum::routing::get;
use axum::Router;

use crate::AppState;

/// Router for `/health/*`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health/live", get(live))
}

async fn live() -> &'static str {
    "ok"
}
