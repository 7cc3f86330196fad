//! # souq-core — Foundational Types for the Souq Catalog Engine
//!
//! This crate is the bedrock of the Souq catalog workspace. It defines the
//! domain primitives every other crate builds on; it depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `ItemId`, `CategoryId`,
//!    `UserId` — no bare strings for identifiers, so an item id can never be
//!    passed where a seller id is expected.
//!
//! 2. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision, so lexicographic order of the stored
//!    string form matches chronological order — the store sorts documents by
//!    their raw field values.
//!
//! 3. **Total normalization.** `CatalogItem::from_document` never fails: a
//!    malformed raw document degrades field-by-field (missing price → 0,
//!    unknown category → `uncategorized`), never poisoning a whole page of
//!    results. Normalization is idempotent.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `souq-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod category;
pub mod identity;
pub mod item;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use category::{CategoryCount, CategoryRef};
pub use identity::{CategoryId, ItemId, UserId};
pub use item::{CatalogItem, ConditionTag, ItemStatus};
pub use temporal::Timestamp;
