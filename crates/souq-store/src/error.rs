//! # Store Error Types
//!
//! Failures at the document store boundary. All errors use `thiserror` for
//! derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Failure at the document store boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A predicate was constructed over a null operand. The store cannot
    /// evaluate "field == null" meaningfully; absent predicates must be
    /// dropped by the caller, not passed through.
    #[error("null operand for predicate on field {field:?}")]
    NullOperand {
        /// The field the predicate targeted.
        field: String,
    },

    /// A membership predicate was constructed over an empty operand list.
    /// An empty list would mean "match nothing"; the caller must drop the
    /// predicate instead.
    #[error("empty operand list for predicate on field {field:?}")]
    EmptyOperandList {
        /// The field the predicate targeted.
        field: String,
    },

    /// A batch update targeted a document that does not exist. The whole
    /// batch aborts with no partial writes.
    #[error("no document {id:?} in collection {collection:?}")]
    MissingDocument {
        /// Target collection.
        collection: String,
        /// Target document key.
        id: String,
    },

    /// The store has been closed; commits are rejected and every live
    /// subscription has been terminated.
    #[error("document store is closed")]
    Closed,
}
