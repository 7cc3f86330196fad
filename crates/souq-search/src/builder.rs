//! # Safe Query Builder
//!
//! The document store rejects predicates over null operands outright — a
//! `where("sellerId", ==, null)` is a programming error at that boundary,
//! not a "match anything" or a "match nothing". This builder is the layer
//! that makes such errors unrepresentable: a predicate whose operand is
//! absent is simply not emitted.
//!
//! Rules, one per predicate shape:
//!
//! - equality / range: emitted only when the operand is present and
//!   non-null.
//! - membership: the operand list is first cleaned of null entries; if the
//!   cleaned list is empty the predicate is dropped entirely.
//! - `order_by` is always emitted; `limit` only when present.
//!
//! The builder itself is infallible. The only failures a composed query can
//! produce happen at execution time inside the store and surface as
//! [`QueryExecutionError`](crate::error::QueryExecutionError).

use serde_json::Value;

use souq_store::{Direction, Filter, FilterOp, Query};

use crate::filters::{SearchFilters, SortSpec};
use crate::PRODUCTS_COLLECTION;

/// Upper bound of the title prefix window: the highest code point the store
/// orders after any string with the given prefix.
const PREFIX_WINDOW_HIGH: char = '\u{f8ff}';

/// Remove exactly the null entries, preserving order and duplicates of the
/// rest. Idempotent.
pub fn clean_query_values(values: Vec<Value>) -> Vec<Value> {
    values.into_iter().filter(|v| !v.is_null()).collect()
}

/// Builds a query by accumulating only the predicates whose operands are
/// present. See the module docs for the per-shape rules.
#[derive(Debug, Clone)]
pub struct SafeQueryBuilder {
    query: Query,
}

impl SafeQueryBuilder {
    /// Start building over a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            query: Query::collection(collection),
        }
    }

    /// Equality predicate, emitted only for a present, non-null operand.
    pub fn eq(mut self, field: &str, operand: Option<Value>) -> Self {
        if let Some(operand) = operand.filter(|v| !v.is_null()) {
            // Operand verified non-null, so construction cannot fail.
            if let Ok(filter) = Filter::new(field, FilterOp::Eq, operand) {
                self.query = self.query.filter(filter);
            }
        }
        self
    }

    /// Membership predicate over a cleaned operand list; dropped when the
    /// cleaned list is empty.
    pub fn membership(self, field: &str, operands: Vec<Value>) -> Self {
        self.list_predicate(field, FilterOp::In, operands)
    }

    /// Array-membership predicate (array field intersects the operand list),
    /// with the same cleaning rule as [`SafeQueryBuilder::membership`].
    pub fn array_contains_any(self, field: &str, operands: Vec<Value>) -> Self {
        self.list_predicate(field, FilterOp::ArrayContainsAny, operands)
    }

    /// Lower-bound predicate, emitted only for a present, non-null operand.
    pub fn range_min(mut self, field: &str, operand: Option<Value>) -> Self {
        if let Some(operand) = operand.filter(|v| !v.is_null()) {
            if let Ok(filter) = Filter::new(field, FilterOp::Gte, operand) {
                self.query = self.query.filter(filter);
            }
        }
        self
    }

    /// Upper-bound predicate, emitted only for a present, non-null operand.
    pub fn range_max(mut self, field: &str, operand: Option<Value>) -> Self {
        if let Some(operand) = operand.filter(|v| !v.is_null()) {
            if let Ok(filter) = Filter::new(field, FilterOp::Lte, operand) {
                self.query = self.query.filter(filter);
            }
        }
        self
    }

    /// Sort order; always emitted.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.query = self.query.order_by(field, direction);
        self
    }

    /// Result limit, emitted only when present.
    pub fn limit(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.query = self.query.limit(n);
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> Query {
        self.query
    }

    fn list_predicate(mut self, field: &str, op: FilterOp, operands: Vec<Value>) -> Self {
        let cleaned = clean_query_values(operands);
        if cleaned.is_empty() {
            return self;
        }
        // Cleaned and non-empty, so construction cannot fail.
        if let Ok(filter) = Filter::new(field, op, Value::Array(cleaned)) {
            self.query = self.query.filter(filter);
        }
        self
    }
}

/// Compose the product query for a filter/sort pair: every non-default
/// filter field becomes a predicate, absent fields become nothing.
///
/// The free-text query becomes a case-insensitive prefix window over the
/// stored `titleLc` field; there is no relevance ranking.
pub fn product_query(filters: &SearchFilters, sort: &SortSpec) -> Query {
    let mut builder = SafeQueryBuilder::new(PRODUCTS_COLLECTION);

    let needle = filters.query.trim().to_lowercase();
    if !needle.is_empty() {
        let upper = format!("{needle}{PREFIX_WINDOW_HIGH}");
        builder = builder
            .range_min("titleLc", Some(Value::String(needle)))
            .range_max("titleLc", Some(Value::String(upper)));
    }

    builder = builder.membership(
        "category",
        filters
            .categories
            .iter()
            .map(|c| Value::String(c.as_str().to_string()))
            .collect(),
    );
    builder = builder.range_min("price", filters.price_range.min.map(Value::from));
    builder = builder.range_max("price", filters.price_range.max.map(Value::from));
    builder = builder.membership(
        "condition",
        filters
            .conditions
            .iter()
            .map(|c| Value::String(c.as_str().to_string()))
            .collect(),
    );
    builder = builder.array_contains_any(
        "tags",
        filters
            .tags
            .iter()
            .map(|t| Value::String(t.clone()))
            .collect(),
    );
    builder = builder.eq(
        "sellerId",
        filters
            .seller_id
            .as_ref()
            .map(|s| Value::String(s.as_str().to_string())),
    );
    builder = builder.range_min(
        "createdAt",
        filters
            .date_range
            .start
            .map(|t| Value::String(t.to_iso8601())),
    );
    builder = builder.range_max(
        "createdAt",
        filters
            .date_range
            .end
            .map(|t| Value::String(t.to_iso8601())),
    );
    if filters.in_stock {
        builder = builder.eq("inStock", Some(Value::Bool(true)));
    }
    if filters.on_sale {
        builder = builder.eq("onSale", Some(Value::Bool(true)));
    }

    builder
        .order_by(sort.field.store_field(), sort.direction)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use souq_core::{CategoryId, UserId};
    use std::collections::BTreeSet;

    #[test]
    fn test_all_unset_filters_emit_no_predicates() {
        let q = product_query(&SearchFilters::default(), &SortSpec::default());
        assert!(q.filters.is_empty());
        assert_eq!(
            q.order_by,
            Some(("createdAt".to_string(), Direction::Descending))
        );
        assert!(q.limit.is_none());
    }

    #[test]
    fn test_clean_removes_exactly_nulls() {
        let cleaned = clean_query_values(vec![
            json!("active"),
            Value::Null,
            Value::Null,
            json!("blocked"),
        ]);
        assert_eq!(cleaned, vec![json!("active"), json!("blocked")]);

        assert!(clean_query_values(vec![Value::Null, Value::Null]).is_empty());
    }

    #[test]
    fn test_clean_preserves_order_and_duplicates() {
        let cleaned = clean_query_values(vec![json!("b"), json!("a"), Value::Null, json!("b")]);
        assert_eq!(cleaned, vec![json!("b"), json!("a"), json!("b")]);
    }

    #[test]
    fn test_membership_over_only_nulls_is_dropped() {
        let q = SafeQueryBuilder::new("products")
            .membership("status", vec![Value::Null, Value::Null])
            .build();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn test_absent_eq_is_dropped() {
        let q = SafeQueryBuilder::new("products")
            .eq("sellerId", None)
            .eq("sellerId", Some(Value::Null))
            .build();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn test_seller_filter_emits_equality() {
        let filters = SearchFilters {
            seller_id: Some(UserId::new("user123")),
            ..Default::default()
        };
        let q = product_query(&filters, &SortSpec::default());
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0].field, "sellerId");
        assert_eq!(q.filters[0].op, FilterOp::Eq);
        assert_eq!(q.filters[0].operand, json!("user123"));
    }

    #[test]
    fn test_category_filter_emits_membership() {
        let filters = SearchFilters {
            categories: BTreeSet::from([CategoryId::new("electronics")]),
            ..Default::default()
        };
        let q = product_query(&filters, &SortSpec::default());
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0].op, FilterOp::In);
        assert_eq!(q.filters[0].operand, json!(["electronics"]));
    }

    #[test]
    fn test_free_text_becomes_prefix_window() {
        let filters = SearchFilters {
            query: "  Camera ".into(),
            ..Default::default()
        };
        let q = product_query(&filters, &SortSpec::default());
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].field, "titleLc");
        assert_eq!(q.filters[0].op, FilterOp::Gte);
        assert_eq!(q.filters[0].operand, json!("camera"));
        assert_eq!(q.filters[1].op, FilterOp::Lte);
        assert_eq!(q.filters[1].operand, json!(format!("camera\u{f8ff}")));
    }

    #[test]
    fn test_boolean_toggles_emit_only_when_true() {
        let mut filters = SearchFilters::default();
        assert!(product_query(&filters, &SortSpec::default())
            .filters
            .is_empty());
        filters.in_stock = true;
        let q = product_query(&filters, &SortSpec::default());
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0].field, "inStock");
        assert_eq!(q.filters[0].operand, json!(true));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            "[a-z]{0,6}".prop_map(Value::String),
            any::<i32>().prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_cleaning_is_idempotent(values in proptest::collection::vec(arb_value(), 0..16)) {
            let once = clean_query_values(values);
            let twice = clean_query_values(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_cleaning_removes_exactly_nulls(values in proptest::collection::vec(arb_value(), 0..16)) {
            let cleaned = clean_query_values(values.clone());
            prop_assert!(cleaned.iter().all(|v| !v.is_null()));
            let expected: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
            prop_assert_eq!(cleaned, expected);
        }
    }
}
