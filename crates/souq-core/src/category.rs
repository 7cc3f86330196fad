//! # Persisted Category Aggregates
//!
//! `CategoryCount` is the long-lived per-category aggregate document. It is
//! mutated by two independent writers — the incremental delta path and the
//! batch recomputation path — and read by category listings. See the
//! reconciler in `souq-search` for the consistency policy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::CategoryId;
use crate::temporal::Timestamp;

/// A category's persisted product count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category_id: CategoryId,
    /// Number of `active` items in the category. Authoritative only
    /// immediately after a batch recomputation; may drift between runs.
    pub product_count: u64,
    pub updated_at: Timestamp,
}

impl CategoryCount {
    /// Normalize a raw category document. Total, like item normalization.
    pub fn from_document(id: &str, fields: &Map<String, Value>) -> Self {
        let product_count = fields
            .get("productCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let updated_at = fields
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(|s| Timestamp::parse(s).ok())
            .unwrap_or_else(Timestamp::epoch);
        Self {
            category_id: CategoryId::new(id),
            product_count,
            updated_at,
        }
    }
}

/// A category reference (id + display name), used in reconciliation reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

impl CategoryRef {
    /// Read the reference fields out of a raw category document. The display
    /// name falls back to the slug.
    pub fn from_document(id: &str, fields: &Map<String, Value>) -> Self {
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        Self {
            id: CategoryId::new(id),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_from_document() {
        let fields = json!({ "productCount": 12, "updatedAt": "2026-01-01T00:00:00Z" });
        let count = CategoryCount::from_document("books", fields.as_object().unwrap());
        assert_eq!(count.category_id.as_str(), "books");
        assert_eq!(count.product_count, 12);
        assert_eq!(count.updated_at.to_iso8601(), "2026-01-01T00:00:00Z");
    }

    #[test]
    fn test_count_from_empty_document() {
        let count = CategoryCount::from_document("books", &Map::new());
        assert_eq!(count.product_count, 0);
        assert_eq!(count.updated_at, Timestamp::epoch());
    }

    #[test]
    fn test_ref_name_falls_back_to_slug() {
        let r = CategoryRef::from_document("books", &Map::new());
        assert_eq!(r.name, "books");
        let named = json!({ "name": "Books & Media" });
        let r = CategoryRef::from_document("books", named.as_object().unwrap());
        assert_eq!(r.name, "Books & Media");
    }
}
