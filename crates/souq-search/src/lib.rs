//! # souq-search — Catalog Search & Real-Time Consistency Engine
//!
//! The engine behind catalog browsing: it translates a multi-field
//! filter/sort/pagination model into queries the document store will always
//! accept, computes facet aggregates for UI refinement, keeps live result
//! sets flowing as the catalog mutates, and reconciles per-category counts
//! through two independent correction paths.
//!
//! ## Components
//!
//! - [`filters`] — typed value objects describing a search request, with
//!   explicit "unset" sentinels per field.
//! - [`builder`] — the safe query builder: a predicate whose operand is
//!   absent is dropped, never emitted. The store rejects null-operand
//!   predicates outright; this layer is why callers never see that error.
//! - [`service`] — one-shot search execution with cursor pagination plus
//!   facet aggregation over the currently filtered population.
//! - [`session`] — search session state: debounced execution, in-flight
//!   deduplication, and stale-response discard keyed by a request sequence
//!   number.
//! - [`realtime`] — live subscriptions to active catalog items, with
//!   per-category delta derivation.
//! - [`reconcile`] — the category count reconciler: a fast incremental path
//!   that may drift, and an authoritative batch recomputation that always
//!   converges.
//!
//! ## Consistency Policy
//!
//! The persisted per-category counts have two writers and no lock. The
//! incremental path is a cache; the batch path's atomic overwrite is the
//! source of truth. A delta landing between a batch scan and its commit is
//! corrected by the next batch run. This is a deliberate eventual-consistency
//! trade-off matching what the store can promise (atomicity within one
//! batch, not across scan-then-write).

pub mod builder;
pub mod error;
pub mod filters;
pub mod realtime;
pub mod reconcile;
pub mod service;
pub mod session;

/// Collection holding raw catalog item documents.
pub const PRODUCTS_COLLECTION: &str = "products";
/// Collection holding category documents (name + persisted product count).
pub const CATEGORIES_COLLECTION: &str = "categories";

pub use builder::{clean_query_values, SafeQueryBuilder};
pub use error::{
    InvalidFilterError, QueryExecutionError, ReconciliationError, SearchError, SubscriptionError,
};
pub use filters::{
    DateRange, FilterPatch, PagePatch, PageState, PriceRange, SearchFilters, SortField, SortSpec,
};
pub use realtime::{ActiveProductFilter, CategoryDelta, ProductSubscription, RealtimeCatalog};
pub use reconcile::{CategoryCountReconciler, CategorySummary, SyncReport};
pub use service::{FacetCounts, PriceBounds, SearchPage, SearchService};
pub use session::{SearchSession, SessionSnapshot};
