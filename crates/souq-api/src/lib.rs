//! # souq-api — Axum API Surface
//!
//! The HTTP layer over the catalog engine, built on Axum/Tower/Tokio.
//!
//! ## Routes
//!
//! - `POST /v1/maintenance/category-counts/sync` — trigger a batch category
//!   count reconciliation on demand and return its report.
//! - `GET /health/live` — liveness probe (unauthenticated).
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → CorsLayer (permissive; the browsing UI is served from a
//! different origin).
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers — delegates to `souq-search`.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/v1/maintenance", routes::maintenance::router())
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
