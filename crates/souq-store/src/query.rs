//! # Composable Queries
//!
//! A [`Query`] names a collection and carries validated filters, an optional
//! sort, a limit, and an optional resume cursor. Construction is by method
//! chaining:
//!
//! ```
//! use serde_json::json;
//! use souq_store::{Direction, Filter, FilterOp, Query};
//!
//! let q = Query::collection("products")
//!     .filter(Filter::new("status", FilterOp::In, json!(["active"])).unwrap())
//!     .order_by("createdAt", Direction::Descending)
//!     .limit(20);
//! assert_eq!(q.filters.len(), 1);
//! ```
//!
//! ## Ordering Invariant
//!
//! Sorting compares the raw field values (numbers numerically, strings
//! lexicographically), with documents missing the sort field placed last
//! regardless of direction, and ties broken by document id. The id tiebreak
//! is what makes cursors stable: two documents never occupy an ambiguous
//! relative position.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::store::Document;

/// A document key within a collection. Doubles as the identity component of
/// pagination cursors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub String);

impl DocId {
    /// Access the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Sort direction for `order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Predicate operator over one document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    /// Field equals the operand.
    Eq,
    /// Field equals any of the operand list entries.
    In,
    /// Array field contains any of the operand list entries.
    ArrayContainsAny,
    /// Field is ordered greater than or equal to the operand.
    Gte,
    /// Field is ordered less than or equal to the operand.
    Lte,
}

impl FilterOp {
    /// Whether the operator takes a list operand.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::ArrayContainsAny)
    }
}

/// A single validated predicate.
///
/// Validation happens at construction: a null operand, a non-array operand
/// for a list operator, an empty operand list, or a list containing nulls is
/// rejected here rather than silently matching nothing at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub operand: Value,
}

impl Filter {
    /// Construct a predicate, rejecting invalid operands.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NullOperand`] for a null operand, a non-array operand
    ///   where a list is required, or a null entry inside a list operand.
    /// - [`StoreError::EmptyOperandList`] for an empty list operand.
    pub fn new(field: impl Into<String>, op: FilterOp, operand: Value) -> Result<Self, StoreError> {
        let field = field.into();
        if op.takes_list() {
            let entries = operand.as_array().ok_or_else(|| StoreError::NullOperand {
                field: field.clone(),
            })?;
            if entries.is_empty() {
                return Err(StoreError::EmptyOperandList { field });
            }
            if entries.iter().any(Value::is_null) {
                return Err(StoreError::NullOperand { field });
            }
        } else if operand.is_null() {
            return Err(StoreError::NullOperand { field });
        }
        Ok(Self { field, op, operand })
    }

    /// Whether a document satisfies this predicate. A document missing the
    /// field never matches.
    pub fn matches(&self, fields: &Document) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => values_equal(actual, &self.operand),
            FilterOp::In => self
                .operand
                .as_array()
                .is_some_and(|opts| opts.iter().any(|v| values_equal(actual, v))),
            FilterOp::ArrayContainsAny => match (actual.as_array(), self.operand.as_array()) {
                (Some(elems), Some(opts)) => elems
                    .iter()
                    .any(|e| opts.iter().any(|v| values_equal(e, v))),
                _ => false,
            },
            FilterOp::Gte => matches!(
                compare_values(actual, &self.operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lte => matches!(
                compare_values(actual, &self.operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// An opaque pagination cursor: the identity and sort key of the last
/// document of a page.
///
/// Carrying the sort key (not just the id) keeps resumption correct even if
/// the cursor document is deleted between pages — the next page starts after
/// the cursor's *position*, not after a document that must still exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub doc_id: DocId,
    /// The cursor document's value for the query's sort field, if it had one.
    pub sort_key: Option<Value>,
}

/// A composed query over one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl Query {
    /// Start a query over the named collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
            start_after: None,
        }
    }

    /// Add a validated predicate.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sort by a field. At most one sort field; a later call replaces the
    /// earlier one.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Truncate results to at most `n` documents.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Resume forward iteration after a previously issued cursor.
    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// Whether a document matches all predicates.
    pub(crate) fn matches(&self, fields: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }

    /// Total order over `(sort key, id)` used for result ordering and cursor
    /// positioning.
    pub(crate) fn position_cmp(
        &self,
        a_key: Option<&Value>,
        a_id: &DocId,
        b_key: Option<&Value>,
        b_id: &DocId,
    ) -> Ordering {
        let primary = match (a_key, b_key) {
            (Some(x), Some(y)) => {
                let cmp = compare_values(x, y).unwrap_or(Ordering::Equal);
                match self.order_by {
                    Some((_, Direction::Descending)) => cmp.reverse(),
                    _ => cmp,
                }
            }
            // Documents missing the sort field sort last in either direction.
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        primary.then_with(|| a_id.cmp(b_id))
    }

    /// The sort key a document contributes under this query's `order_by`.
    pub(crate) fn sort_key<'a>(&self, fields: &'a Document) -> Option<&'a Value> {
        self.order_by
            .as_ref()
            .and_then(|(field, _)| fields.get(field))
    }
}

/// Equality with numeric coercion: `5` and `5.0` are the same value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Partial order over field values: numbers numerically, strings
/// lexicographically, booleans false-before-true. Mismatched or unordered
/// types have no order.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
