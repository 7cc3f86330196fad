//! # Search Error Taxonomy
//!
//! Four failure classes with distinct retry semantics:
//!
//! - [`InvalidFilterError`] — malformed request, rejected before any query
//!   is built. Not retryable; the request itself is wrong.
//! - [`QueryExecutionError`] — store failure during a one-shot query.
//!   Retryable by the caller; the UI renders a retry affordance.
//! - [`SubscriptionError`] — a live subscription terminated. Delivered once
//!   via the subscriber's error callback; reconnection policy belongs to the
//!   caller.
//! - [`ReconciliationError`] — batch recomputation failed. The whole batch
//!   aborts with no partial writes, so prior counts stand and the operation
//!   is safe to retry.

use thiserror::Error;

use souq_core::Timestamp;
use souq_store::StoreError;

/// A malformed filter combination, rejected before query construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidFilterError {
    /// `priceRange.min` exceeds `priceRange.max`.
    #[error("price range inverted: min {min} exceeds max {max}")]
    PriceRangeInverted {
        /// Requested lower bound.
        min: f64,
        /// Requested upper bound.
        max: f64,
    },

    /// `dateRange.start` is after `dateRange.end`.
    #[error("date range inverted: start {start} is after end {end}")]
    DateRangeInverted {
        /// Requested start of the window.
        start: Timestamp,
        /// Requested end of the window.
        end: Timestamp,
    },

    /// The page size is not one of the supported limits.
    #[error("unsupported page limit {limit}; expected one of 10, 20, 50")]
    UnsupportedLimit {
        /// The rejected page size.
        limit: u32,
    },
}

/// A store failure during one-shot query execution. Retryable.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("query execution failed: {0}")]
pub struct QueryExecutionError(#[from] pub StoreError);

/// A live subscription has terminated. Delivered at most once per
/// subscription; never auto-resubscribed by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscriptionError {
    /// The underlying store subscription failed or was shut down.
    #[error("subscription terminated: {0}")]
    Terminated(#[from] StoreError),
}

/// A batch count recomputation failed. No partial writes occurred.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconciliationError {
    /// Scanning categories or products failed before any write was staged.
    #[error("reconciliation scan failed: {0}")]
    Scan(#[source] StoreError),

    /// The batch commit was rejected; every prior count is unchanged.
    #[error("reconciliation commit failed: {0}")]
    Commit(#[source] StoreError),
}

/// Umbrella error the search session surfaces to UI state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Rejected before querying; not retryable.
    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),

    /// Store failure; retryable.
    #[error(transparent)]
    Query(#[from] QueryExecutionError),
}

impl SearchError {
    /// Whether retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_split() {
        let invalid: SearchError = InvalidFilterError::UnsupportedLimit { limit: 7 }.into();
        assert!(!invalid.is_retryable());

        let query: SearchError = QueryExecutionError(StoreError::Closed).into();
        assert!(query.is_retryable());
    }
}
