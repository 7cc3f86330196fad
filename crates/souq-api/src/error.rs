//! # Application Error
//!
//! Maps engine errors to structured HTTP responses. Maintenance responses
//! carry a `success` flag so operational tooling can branch on the body
//! without inspecting the status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use souq_search::ReconciliationError;

/// Application-level error type that maps to HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// Batch reconciliation failed; no partial writes occurred and the
    /// request is safe to retry.
    #[error("reconciliation failed: {0}")]
    Reconciliation(#[from] ReconciliationError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Reconciliation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
