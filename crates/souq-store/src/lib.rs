//! # souq-store — Document Store Boundary
//!
//! An in-memory document store exposing exactly the primitives the catalog
//! engine is allowed to assume of its backing store: named collections of
//! JSON documents, composable filter/order/limit queries with cursor-based
//! forward pagination, one-shot reads, live snapshot subscriptions, and
//! atomic write batches.
//!
//! ## Boundary Rules
//!
//! - A predicate over a null operand is **rejected at construction**
//!   ([`StoreError::NullOperand`]). Callers that may hold absent values go
//!   through the safe query builder in `souq-search`, which drops such
//!   predicates instead of emitting them.
//! - Queries offer stable forward iteration (order + id tiebreak + cursor),
//!   not random-offset skipping.
//! - A batch commit is all-or-nothing: a missing update target aborts the
//!   whole batch before any write becomes visible.
//! - Subscriptions are explicit resource handles; dropping or releasing the
//!   handle stops delivery and frees the registration.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `souq-*` crates.
//! - Subscription callbacks are invoked outside the store lock, so a
//!   callback may itself commit a batch.

pub mod error;
pub mod query;
pub mod store;

pub use error::StoreError;
pub use query::{Cursor, Direction, DocId, Filter, FilterOp, Query};
pub use store::{Document, DocumentSnapshot, DocumentStore, QuerySnapshot, Subscription, WriteBatch};
