//! # Application State
//!
//! Shared state for the Axum application: the engine services every route
//! handler delegates to.

use souq_search::CategoryCountReconciler;
use souq_store::DocumentStore;

/// Shared application state passed to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub reconciler: CategoryCountReconciler,
}

impl AppState {
    /// Build the state over a document store.
    pub fn new(store: DocumentStore) -> Self {
        Self {
            reconciler: CategoryCountReconciler::new(store),
        }
    }
}
