//! # Search Service
//!
//! One-shot catalog search plus facet aggregation. Stateless: every call
//! validates, composes a query through the safe builder, executes it, and
//! normalizes the raw documents. All state (current filters, in-flight
//! tracking, stale discard) lives in the session controller.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use souq_core::{CatalogItem, CategoryId, ConditionTag};
use souq_store::{Cursor, DocumentStore, QuerySnapshot};

use crate::builder::product_query;
use crate::error::{QueryExecutionError, SearchError};
use crate::filters::{PageState, SearchFilters, SortSpec};

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub items: Vec<CatalogItem>,
    /// Number of items in this fetch.
    pub total_count: usize,
    /// Conservative continuation signal: `true` iff the page came back
    /// full. A catalog whose size is an exact multiple of the limit will
    /// therefore report one extra page whose fetch returns empty — accepted
    /// behavior, cheaper than maintaining a true total count.
    pub has_next_page: bool,
    /// Resume point for the next page, valid only for the exact
    /// `(filters, sort, limit)` tuple that produced it.
    pub next_cursor: Option<Cursor>,
}

/// Observed price bounds of a filtered population.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

/// Facet aggregates over the currently filtered population.
///
/// Derived, never authoritative: recomputed per search execution. Each facet
/// is computed with its own filter dimension excluded, so it reflects "what
/// else is available under the other filters" rather than double-restricting
/// itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetCounts {
    pub categories: BTreeMap<CategoryId, u64>,
    pub conditions: BTreeMap<ConditionTag, u64>,
    /// Bounds over documents that carry a price; documents without one are
    /// excluded. `{0, 0}` for an empty population.
    pub price_range: PriceBounds,
}

/// Stateless search execution against the document store.
#[derive(Debug, Clone)]
pub struct SearchService {
    store: DocumentStore,
    latency: Option<Duration>,
}

impl SearchService {
    /// Create a service over a store.
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            latency: None,
        }
    }

    /// Create a service that sleeps before each store round-trip, for
    /// exercising request interleavings in tests and demos.
    pub fn with_simulated_latency(store: DocumentStore, latency: Duration) -> Self {
        Self {
            store,
            latency: Some(latency),
        }
    }

    /// Execute one page of a search.
    ///
    /// Pipeline: validate → compose via the safe builder → execute with the
    /// cursor → normalize → page-full continuation heuristic.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidFilter`] for a malformed request (nothing is
    /// sent to the store); [`SearchError::Query`] for a store failure
    /// (retryable).
    pub async fn search_products(
        &self,
        filters: &SearchFilters,
        sort: &SortSpec,
        page: &PageState,
    ) -> Result<SearchPage, SearchError> {
        filters.validate()?;
        page.validate()?;

        let mut query = product_query(filters, sort).limit(page.limit as usize);
        if let Some(cursor) = &page.cursor {
            query = query.start_after(cursor.clone());
        }

        let snapshot = self.execute(&query).await?;
        let items: Vec<CatalogItem> = snapshot
            .docs
            .iter()
            .map(|doc| CatalogItem::from_document(doc.id.as_str(), &doc.fields))
            .collect();

        tracing::debug!(
            returned = items.len(),
            limit = page.limit,
            page = page.page,
            "search page executed"
        );

        Ok(SearchPage {
            total_count: items.len(),
            has_next_page: snapshot.len() == page.limit as usize,
            next_cursor: snapshot.next_cursor,
            items,
        })
    }

    /// Compute facet aggregates for the population the filters select,
    /// excluding each facet's own dimension from its query.
    pub async fn facet_counts(&self, filters: &SearchFilters) -> Result<FacetCounts, SearchError> {
        filters.validate()?;
        let sort = SortSpec::default();

        let mut without_categories = filters.clone();
        without_categories.categories.clear();
        let category_population = self
            .execute(&product_query(&without_categories, &sort))
            .await?;

        let mut without_conditions = filters.clone();
        without_conditions.conditions.clear();
        let condition_population = self
            .execute(&product_query(&without_conditions, &sort))
            .await?;

        let mut without_price = filters.clone();
        without_price.price_range = Default::default();
        let price_population = self.execute(&product_query(&without_price, &sort)).await?;

        let mut categories: BTreeMap<CategoryId, u64> = BTreeMap::new();
        for doc in &category_population.docs {
            let item = CatalogItem::from_document(doc.id.as_str(), &doc.fields);
            *categories.entry(item.category).or_default() += 1;
        }

        let mut conditions: BTreeMap<ConditionTag, u64> = BTreeMap::new();
        for doc in &condition_population.docs {
            let item = CatalogItem::from_document(doc.id.as_str(), &doc.fields);
            if let Some(condition) = item.condition {
                *conditions.entry(condition).or_default() += 1;
            }
        }

        let mut price_range = PriceBounds::default();
        let mut prices = price_population
            .docs
            .iter()
            .filter_map(|doc| doc.fields.get("price"))
            .filter_map(Value::as_f64)
            .filter(|p| p.is_finite());
        if let Some(first) = prices.next() {
            let (min, max) = prices.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
            price_range = PriceBounds { min, max };
        }

        Ok(FacetCounts {
            categories,
            conditions,
            price_range,
        })
    }

    async fn execute(&self, query: &souq_store::Query) -> Result<QuerySnapshot, SearchError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let snapshot = self
            .store
            .get_docs(query)
            .await
            .map_err(QueryExecutionError)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PriceRange;
    use crate::PRODUCTS_COLLECTION;
    use serde_json::json;
    use souq_store::DocId;
    use std::collections::BTreeSet;

    async fn seed(store: &DocumentStore, docs: &[(&str, Value)]) {
        let mut batch = store.write_batch();
        for (id, value) in docs {
            batch.set(
                PRODUCTS_COLLECTION,
                DocId::from(*id),
                value.as_object().cloned().unwrap(),
            );
        }
        batch.commit().await.unwrap();
    }

    fn item_doc(title: &str, price: f64, category: &str, condition: &str) -> Value {
        json!({
            "title": title,
            "titleLc": title.to_lowercase(),
            "price": price,
            "category": category,
            "condition": condition,
            "status": "active",
            "createdAt": "2026-01-15T12:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_page() {
        let service = SearchService::new(DocumentStore::new());
        let page = service
            .search_products(
                &SearchFilters::default(),
                &SortSpec::default(),
                &PageState::default(),
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
        assert!(!page.has_next_page);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_invalid_filters_rejected_before_store() {
        let store = DocumentStore::new();
        // A closed store fails every query, so reaching the store would
        // surface a query error rather than the filter error asserted here.
        store.close();
        let service = SearchService::new(store);
        let filters = SearchFilters {
            price_range: PriceRange {
                min: Some(10.0),
                max: Some(1.0),
            },
            ..Default::default()
        };
        let err = service
            .search_products(&filters, &SortSpec::default(), &PageState::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_full_page_sets_has_next_and_cursor_resumes() {
        let store = DocumentStore::new();
        let docs: Vec<(String, Value)> = (0..25)
            .map(|i| {
                (
                    format!("item-{i:02}"),
                    item_doc(&format!("Item {i:02}"), i as f64, "misc", "good"),
                )
            })
            .collect();
        let borrowed: Vec<(&str, Value)> =
            docs.iter().map(|(id, v)| (id.as_str(), v.clone())).collect();
        seed(&store, &borrowed).await;

        let service = SearchService::new(store);
        let sort = SortSpec {
            field: crate::filters::SortField::Price,
            direction: souq_store::Direction::Ascending,
        };
        let mut page = PageState {
            limit: 10,
            ..Default::default()
        };

        let first = service
            .search_products(&SearchFilters::default(), &sort, &page)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 10);
        assert!(first.has_next_page);

        page.cursor = first.next_cursor.clone();
        page.page = 2;
        let second = service
            .search_products(&SearchFilters::default(), &sort, &page)
            .await
            .unwrap();
        assert_eq!(second.items[0].title, "Item 10");
        assert!(second.has_next_page);

        page.cursor = second.next_cursor.clone();
        page.page = 3;
        let third = service
            .search_products(&SearchFilters::default(), &sort, &page)
            .await
            .unwrap();
        assert_eq!(third.items.len(), 5);
        assert!(!third.has_next_page);
    }

    #[tokio::test]
    async fn test_exact_multiple_reports_one_extra_empty_page() {
        let store = DocumentStore::new();
        let docs: Vec<(String, Value)> = (0..20)
            .map(|i| {
                (
                    format!("item-{i:02}"),
                    item_doc(&format!("Item {i:02}"), i as f64, "misc", "good"),
                )
            })
            .collect();
        let borrowed: Vec<(&str, Value)> =
            docs.iter().map(|(id, v)| (id.as_str(), v.clone())).collect();
        seed(&store, &borrowed).await;

        let service = SearchService::new(store);
        let mut page = PageState {
            limit: 10,
            ..Default::default()
        };
        let first = service
            .search_products(&SearchFilters::default(), &SortSpec::default(), &page)
            .await
            .unwrap();
        page.cursor = first.next_cursor;
        let second = service
            .search_products(&SearchFilters::default(), &SortSpec::default(), &page)
            .await
            .unwrap();
        // Page two is full, so the conservative heuristic says "more".
        assert!(second.has_next_page);

        page.cursor = second.next_cursor;
        let third = service
            .search_products(&SearchFilters::default(), &SortSpec::default(), &page)
            .await
            .unwrap();
        assert!(third.items.is_empty());
        assert!(!third.has_next_page);
    }

    #[tokio::test]
    async fn test_normalization_fallbacks_do_not_fail_the_page() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("good", item_doc("Camera", 10.0, "electronics", "good")),
                ("bad", json!({ "title": 42, "price": "free" })),
            ],
        )
        .await;
        let service = SearchService::new(store);
        let page = service
            .search_products(
                &SearchFilters::default(),
                &SortSpec::default(),
                &PageState::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        let bad = page.items.iter().find(|i| i.id.as_str() == "bad").unwrap();
        assert_eq!(bad.price, 0.0);
        assert_eq!(bad.category.as_str(), "uncategorized");
    }

    #[tokio::test]
    async fn test_facets_exclude_their_own_dimension() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("a", item_doc("A", 10.0, "electronics", "good")),
                ("b", item_doc("B", 20.0, "electronics", "new")),
                ("c", item_doc("C", 30.0, "books", "good")),
            ],
        )
        .await;
        let service = SearchService::new(store);

        let filters = SearchFilters {
            categories: BTreeSet::from([CategoryId::new("electronics")]),
            ..Default::default()
        };
        let facets = service.facet_counts(&filters).await.unwrap();
        // The category facet ignores the category filter, so "books" still
        // shows as available.
        assert_eq!(facets.categories[&CategoryId::new("books")], 1);
        assert_eq!(facets.categories[&CategoryId::new("electronics")], 2);
        // The condition facet honors the category filter.
        assert_eq!(facets.conditions[&ConditionTag::Good], 1);
        assert_eq!(facets.conditions[&ConditionTag::New], 1);
        assert_eq!(facets.price_range, PriceBounds { min: 10.0, max: 20.0 });
    }

    #[tokio::test]
    async fn test_missing_prices_excluded_from_bounds() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("a", json!({ "title": "A", "status": "active" })),
                ("b", item_doc("B", 15.0, "books", "good")),
            ],
        )
        .await;
        let service = SearchService::new(store);
        let facets = service.facet_counts(&SearchFilters::default()).await.unwrap();
        assert_eq!(facets.price_range, PriceBounds { min: 15.0, max: 15.0 });
    }
}
