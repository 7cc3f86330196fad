//! # Filter, Sort, and Pagination Model
//!
//! Typed value objects describing a search request. Every field of
//! [`SearchFilters`] is always present with an explicit "unset" sentinel —
//! `None` for scalars, an empty set for collections, an empty string for the
//! free-text query, `false` for the boolean toggles — so the safe query
//! builder's "valid vs. absent" check is one uniform rule, never a guess
//! about which keys exist.
//!
//! ## Pagination Invariant
//!
//! A cursor is only valid for the exact `(filters, sort, limit)` tuple that
//! produced it. The session controller enforces this by resetting
//! [`PageState`] to page 1 with no cursor on any filter or sort mutation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use souq_core::{CategoryId, ConditionTag, Timestamp, UserId};
use souq_store::{Cursor, Direction};

use crate::error::InvalidFilterError;

/// Price window. `None` bounds are unset and emit no predicate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Creation-time window. `None` bounds are unset and emit no predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

/// The full filter state of a search request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Free-text query; empty means unset. Matched as a case-insensitive
    /// title prefix window — there is no relevance ranking.
    pub query: String,
    pub categories: BTreeSet<CategoryId>,
    pub price_range: PriceRange,
    pub conditions: BTreeSet<ConditionTag>,
    pub tags: BTreeSet<String>,
    pub seller_id: Option<UserId>,
    pub date_range: DateRange,
    /// `false` is the unset sentinel: only `true` emits a predicate.
    pub in_stock: bool,
    /// `false` is the unset sentinel: only `true` emits a predicate.
    pub on_sale: bool,
}

impl SearchFilters {
    /// Reject malformed filter combinations before any query is built.
    pub fn validate(&self) -> Result<(), InvalidFilterError> {
        if let (Some(min), Some(max)) = (self.price_range.min, self.price_range.max) {
            if min > max {
                return Err(InvalidFilterError::PriceRangeInverted { min, max });
            }
        }
        if let (Some(start), Some(end)) = (self.date_range.start, self.date_range.end) {
            if start > end {
                return Err(InvalidFilterError::DateRangeInverted { start, end });
            }
        }
        Ok(())
    }

    /// Merge a partial update into this filter state.
    pub fn apply(&mut self, patch: FilterPatch) {
        if let Some(query) = patch.query {
            self.query = query;
        }
        if let Some(categories) = patch.categories {
            self.categories = categories;
        }
        if let Some(price_range) = patch.price_range {
            self.price_range = price_range;
        }
        if let Some(conditions) = patch.conditions {
            self.conditions = conditions;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(seller_id) = patch.seller_id {
            self.seller_id = seller_id;
        }
        if let Some(date_range) = patch.date_range {
            self.date_range = date_range;
        }
        if let Some(in_stock) = patch.in_stock {
            self.in_stock = in_stock;
        }
        if let Some(on_sale) = patch.on_sale {
            self.on_sale = on_sale;
        }
    }
}

/// A partial filter update. `None` fields leave the current value alone;
/// `seller_id` uses a nested `Option` so a patch can explicitly clear it.
#[derive(Debug, Clone, Default)]
pub struct FilterPatch {
    pub query: Option<String>,
    pub categories: Option<BTreeSet<CategoryId>>,
    pub price_range: Option<PriceRange>,
    pub conditions: Option<BTreeSet<ConditionTag>>,
    pub tags: Option<BTreeSet<String>>,
    pub seller_id: Option<Option<UserId>>,
    pub date_range: Option<DateRange>,
    pub in_stock: Option<bool>,
    pub on_sale: Option<bool>,
}

/// Sortable fields of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    CreatedAt,
    Price,
    ViewCount,
    Title,
}

impl SortField {
    /// The raw document field this sort reads.
    pub fn store_field(&self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::Price => "price",
            Self::ViewCount => "viewCount",
            Self::Title => "title",
        }
    }
}

/// Declared sort order. Sort is by field only — no scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: Direction,
}

impl Default for SortSpec {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: Direction::Descending,
        }
    }
}

/// Supported page sizes.
pub const ALLOWED_PAGE_LIMITS: [u32; 3] = [10, 20, 50];

/// Cursor-based pagination state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    /// 1-based page counter, for display and "seen so far" arithmetic.
    pub page: u32,
    /// Page size; must be one of [`ALLOWED_PAGE_LIMITS`].
    pub limit: u32,
    /// Opaque resume point from the previous page, if any.
    pub cursor: Option<Cursor>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            cursor: None,
        }
    }
}

impl PageState {
    /// Reject unsupported page sizes.
    pub fn validate(&self) -> Result<(), InvalidFilterError> {
        if !ALLOWED_PAGE_LIMITS.contains(&self.limit) {
            return Err(InvalidFilterError::UnsupportedLimit { limit: self.limit });
        }
        Ok(())
    }

    /// Drop the cursor and return to page 1. Called whenever filters or sort
    /// change, because the cursor was issued for the old tuple.
    pub fn invalidate_cursor(&mut self) {
        self.page = 1;
        self.cursor = None;
    }

    /// Merge a partial update into this pagination state.
    pub fn apply(&mut self, patch: PagePatch) {
        if let Some(page) = patch.page {
            self.page = page.max(1);
        }
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
        if let Some(cursor) = patch.cursor {
            self.cursor = cursor;
        }
    }
}

/// A partial pagination update.
#[derive(Debug, Clone, Default)]
pub struct PagePatch {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub cursor: Option<Option<Cursor>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use souq_store::DocId;

    #[test]
    fn test_default_filters_are_all_unset() {
        let f = SearchFilters::default();
        assert!(f.query.is_empty());
        assert!(f.categories.is_empty());
        assert_eq!(f.price_range, PriceRange::default());
        assert!(f.conditions.is_empty());
        assert!(f.tags.is_empty());
        assert!(f.seller_id.is_none());
        assert!(!f.in_stock);
        assert!(!f.on_sale);
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_inverted_price_range_rejected() {
        let f = SearchFilters {
            price_range: PriceRange {
                min: Some(100.0),
                max: Some(10.0),
            },
            ..Default::default()
        };
        assert!(matches!(
            f.validate(),
            Err(InvalidFilterError::PriceRangeInverted { .. })
        ));
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let f = SearchFilters {
            date_range: DateRange {
                start: Some(Timestamp::parse("2026-02-01T00:00:00Z").unwrap()),
                end: Some(Timestamp::parse("2026-01-01T00:00:00Z").unwrap()),
            },
            ..Default::default()
        };
        assert!(matches!(
            f.validate(),
            Err(InvalidFilterError::DateRangeInverted { .. })
        ));
    }

    #[test]
    fn test_half_open_ranges_are_valid() {
        let f = SearchFilters {
            price_range: PriceRange {
                min: Some(10.0),
                max: None,
            },
            ..Default::default()
        };
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut f = SearchFilters {
            query: "camera".into(),
            in_stock: true,
            ..Default::default()
        };
        f.apply(FilterPatch {
            query: Some("lens".into()),
            ..Default::default()
        });
        assert_eq!(f.query, "lens");
        assert!(f.in_stock, "untouched fields survive a patch");
    }

    #[test]
    fn test_patch_can_clear_seller() {
        let mut f = SearchFilters {
            seller_id: Some(UserId::new("user123")),
            ..Default::default()
        };
        f.apply(FilterPatch {
            seller_id: Some(None),
            ..Default::default()
        });
        assert!(f.seller_id.is_none());
    }

    #[test]
    fn test_unsupported_limit_rejected() {
        let page = PageState {
            limit: 7,
            ..Default::default()
        };
        assert!(matches!(
            page.validate(),
            Err(InvalidFilterError::UnsupportedLimit { limit: 7 })
        ));
    }

    #[test]
    fn test_invalidate_cursor_resets_to_page_one() {
        let mut page = PageState {
            page: 4,
            limit: 10,
            cursor: Some(Cursor {
                doc_id: DocId::from("last"),
                sort_key: None,
            }),
        };
        page.invalidate_cursor();
        assert_eq!(page.page, 1);
        assert!(page.cursor.is_none());
        assert_eq!(page.limit, 10, "limit survives invalidation");
    }
}
