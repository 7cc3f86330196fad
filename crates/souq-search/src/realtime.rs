//! # Realtime Catalog Subscriber
//!
//! Live subscriptions over the active slice of the catalog. Each
//! subscription is an explicit resource handle — callers pair every
//! `subscribe` with a `release` (or rely on drop) on every exit path,
//! including error paths. A leaked handle is a leaked store registration.
//!
//! ## Failure Semantics
//!
//! A subscription error is delivered exactly once through the error
//! callback and the subscription is then terminated. The engine never
//! auto-resubscribes; reconnection policy belongs to the caller.
//!
//! ## Delta Derivation
//!
//! [`RealtimeCatalog::subscribe_with_deltas`] diffs consecutive snapshots'
//! `item → category` maps and emits one signed [`CategoryDelta`] per
//! category whose active membership changed. The initial attach snapshot
//! establishes the baseline and emits nothing — those items are already
//! reflected in the persisted counts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;

use souq_core::{CatalogItem, CategoryCount, CategoryId, ItemId, UserId};
use souq_store::{DocumentStore, Query, QuerySnapshot, Subscription};

use crate::builder::SafeQueryBuilder;
use crate::error::SubscriptionError;
use crate::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};

/// Optional narrowing of an active-products subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveProductFilter {
    pub category: Option<CategoryId>,
    pub seller_id: Option<UserId>,
}

/// A signed change to one category's active-item population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDelta {
    pub category: CategoryId,
    /// Net change; never zero when emitted.
    pub delta: i64,
}

/// Handle for a live catalog subscription. Releasing (or dropping) stops
/// delivery and frees the underlying store registration.
#[derive(Debug)]
pub struct ProductSubscription {
    inner: Subscription,
}

impl ProductSubscription {
    /// Stop delivery and free the registration.
    pub fn release(self) {
        self.inner.release();
    }
}

/// Factory for live catalog subscriptions.
#[derive(Debug, Clone)]
pub struct RealtimeCatalog {
    store: DocumentStore,
}

impl RealtimeCatalog {
    /// Create a subscriber over a store.
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// The live query for active items, optionally narrowed by category and
    /// seller. Built through the safe builder, so unset narrowing fields
    /// emit no predicate.
    pub fn active_products_query(filter: &ActiveProductFilter) -> Query {
        SafeQueryBuilder::new(PRODUCTS_COLLECTION)
            .membership("status", vec![json!("active")])
            .eq(
                "category",
                filter
                    .category
                    .as_ref()
                    .map(|c| json!(c.as_str())),
            )
            .eq(
                "sellerId",
                filter
                    .seller_id
                    .as_ref()
                    .map(|s| json!(s.as_str())),
            )
            .build()
    }

    /// Subscribe to the active slice of the catalog.
    ///
    /// `on_items` receives the full normalized current result set at attach
    /// and after every change to it. `on_error` fires at most once, after
    /// which the subscription is terminated.
    pub fn subscribe_to_active_products(
        &self,
        filter: ActiveProductFilter,
        on_items: impl Fn(Vec<CatalogItem>) + Send + Sync + 'static,
        on_error: impl Fn(SubscriptionError) + Send + Sync + 'static,
    ) -> ProductSubscription {
        let query = Self::active_products_query(&filter);
        let inner = self.store.on_snapshot(
            query,
            move |snapshot| on_items(normalize_snapshot(&snapshot)),
            move |err| on_error(SubscriptionError::Terminated(err)),
        );
        ProductSubscription { inner }
    }

    /// Subscribe to the active slice and stream per-category deltas into a
    /// channel, for consumption by the count reconciler's incremental path.
    pub fn subscribe_with_deltas(
        &self,
        filter: ActiveProductFilter,
        deltas: UnboundedSender<CategoryDelta>,
        on_error: impl Fn(SubscriptionError) + Send + Sync + 'static,
    ) -> ProductSubscription {
        let query = Self::active_products_query(&filter);
        let baseline: Mutex<Option<HashMap<ItemId, CategoryId>>> = Mutex::new(None);
        let inner = self.store.on_snapshot(
            query,
            move |snapshot| {
                let current = membership_map(&snapshot);
                let mut guard = match baseline.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(previous) = guard.as_ref() {
                    for delta in category_deltas(previous, &current) {
                        // A closed receiver means the consumer is gone;
                        // nothing useful to do but drop the event.
                        let _ = deltas.send(delta);
                    }
                }
                *guard = Some(current);
            },
            move |err| on_error(SubscriptionError::Terminated(err)),
        );
        ProductSubscription { inner }
    }

    /// Watch the persisted per-category counts, delivering the full set on
    /// attach and after every change.
    pub fn subscribe_to_product_count_changes(
        &self,
        on_counts: impl Fn(Vec<CategoryCount>) + Send + Sync + 'static,
        on_error: impl Fn(SubscriptionError) + Send + Sync + 'static,
    ) -> ProductSubscription {
        let inner = self.store.on_snapshot(
            Query::collection(CATEGORIES_COLLECTION),
            move |snapshot| {
                let counts = snapshot
                    .docs
                    .iter()
                    .map(|doc| CategoryCount::from_document(doc.id.as_str(), &doc.fields))
                    .collect();
                on_counts(counts);
            },
            move |err| on_error(SubscriptionError::Terminated(err)),
        );
        ProductSubscription { inner }
    }
}

fn normalize_snapshot(snapshot: &QuerySnapshot) -> Vec<CatalogItem> {
    snapshot
        .docs
        .iter()
        .map(|doc| CatalogItem::from_document(doc.id.as_str(), &doc.fields))
        .collect()
}

fn membership_map(snapshot: &QuerySnapshot) -> HashMap<ItemId, CategoryId> {
    snapshot
        .docs
        .iter()
        .map(|doc| {
            let item = CatalogItem::from_document(doc.id.as_str(), &doc.fields);
            (item.id, item.category)
        })
        .collect()
}

/// Net per-category changes between two active-membership maps: items
/// entering the set count +1 toward their category, items leaving count -1,
/// an item that moved categories counts once on each side.
fn category_deltas(
    previous: &HashMap<ItemId, CategoryId>,
    current: &HashMap<ItemId, CategoryId>,
) -> Vec<CategoryDelta> {
    let mut net: BTreeMap<CategoryId, i64> = BTreeMap::new();
    for (id, category) in current {
        match previous.get(id) {
            None => *net.entry(category.clone()).or_default() += 1,
            Some(old) if old != category => {
                *net.entry(category.clone()).or_default() += 1;
                *net.entry(old.clone()).or_default() -= 1;
            }
            Some(_) => {}
        }
    }
    for (id, category) in previous {
        if !current.contains_key(id) {
            *net.entry(category.clone()).or_default() -= 1;
        }
    }
    net.into_iter()
        .filter(|(_, delta)| *delta != 0)
        .map(|(category, delta)| CategoryDelta { category, delta })
        .collect()
}
