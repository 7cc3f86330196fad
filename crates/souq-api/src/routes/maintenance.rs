//! # Maintenance Routes
//!
//! Operational endpoints. The count synchronization trigger exists so an
//! operator (or a scheduler without access to the in-process periodic loop)
//! can force the authoritative batch recomputation at any time.
//!
//! Routes:
//! - POST /v1/maintenance/category-counts/sync — run
//!   `synchronize_category_counts()` and return its report.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use souq_core::CategoryRef;
use souq_search::CategorySummary;

use crate::{AppError, AppState};

/// Router for `/v1/maintenance/*`.
pub fn router() -> Router<AppState> {
    Router::new().route("/category-counts/sync", post(sync_category_counts))
}

/// Success body of a sync run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    success: bool,
    updated_categories: usize,
    summary: Vec<CategorySummary>,
    zero_count_categories: Vec<CategoryRef>,
}

async fn sync_category_counts(
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, AppError> {
    let report = state.reconciler.synchronize_category_counts().await?;
    Ok(Json(SyncResponse {
        success: true,
        updated_categories: report.updated_categories,
        summary: report.summary,
        zero_count_categories: report.zero_count_categories,
    }))
}
