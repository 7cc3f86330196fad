//! # Category Count Reconciler
//!
//! Two independent correction paths over one persisted aggregate:
//!
//! - **Incremental** ([`CategoryCountReconciler::apply_delta`]) — adjusts a
//!   single category's count as subscription deltas arrive. Fast, best
//!   effort, not exactly-once: a replayed delta after a reconnect can over-
//!   or under-count.
//! - **Batch** ([`CategoryCountReconciler::synchronize_category_counts`]) —
//!   full scan, count active items per category, overwrite every category's
//!   count in one atomic batch. Authoritative; safe to run at any time;
//!   always converges regardless of prior incremental drift.
//!
//! No lock coordinates the two. The batch overwrite supersedes interleaved
//! incremental writes; a delta landing between a batch scan and its commit
//! survives only until the next batch run. The store guarantees atomicity
//! within one batch, not across scan-then-write, and the design accepts
//! exactly that.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use souq_core::{CatalogItem, CategoryCount, CategoryId, CategoryRef, ItemStatus, Timestamp};
use souq_store::{DocId, DocumentStore, Query};

use crate::error::ReconciliationError;
use crate::realtime::CategoryDelta;
use crate::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};

/// One category's recomputed count, as reported by a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category_id: CategoryId,
    pub count: u64,
}

/// Outcome of one batch recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Number of category documents rewritten.
    pub updated_categories: usize,
    /// Every category with its recomputed count.
    pub summary: Vec<CategorySummary>,
    /// Categories whose recomputed count is zero, reported separately for
    /// operational visibility.
    pub zero_count_categories: Vec<CategoryRef>,
}

/// Keeps the persisted per-category counts in line with the catalog.
#[derive(Debug, Clone)]
pub struct CategoryCountReconciler {
    store: DocumentStore,
    latency: Option<Duration>,
}

impl CategoryCountReconciler {
    /// Create a reconciler over a store.
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            latency: None,
        }
    }

    /// Create a reconciler that sleeps before each batch-path store
    /// round-trip, for exercising scan-to-commit interleavings in tests.
    pub fn with_simulated_latency(store: DocumentStore, latency: Duration) -> Self {
        Self {
            store,
            latency: Some(latency),
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Incremental path: apply one subscription delta to its category's
    /// persisted count, clamped at zero.
    ///
    /// Best effort: failures are logged and swallowed, an unknown category
    /// is skipped (category documents are provisioned by catalog
    /// administration, never created here), and duplicate delivery is
    /// tolerated; the batch path corrects any drift.
    pub async fn apply_delta(&self, delta: &CategoryDelta) {
        let id = DocId::from(delta.category.as_str());
        let current = match self.store.get_doc(CATEGORIES_COLLECTION, &id).await {
            Ok(Some(doc)) => CategoryCount::from_document(doc.id.as_str(), &doc.fields),
            Ok(None) => {
                tracing::warn!(category = %delta.category, "skipping delta for unknown category");
                return;
            }
            Err(err) => {
                tracing::warn!(category = %delta.category, %err, "delta read failed");
                return;
            }
        };

        let adjusted = (current.product_count as i64 + delta.delta).max(0) as u64;
        let mut batch = self.store.write_batch();
        batch.update(
            CATEGORIES_COLLECTION,
            id,
            count_fields(adjusted, Timestamp::now()),
        );
        if let Err(err) = batch.commit().await {
            tracing::warn!(category = %delta.category, %err, "delta write failed");
            return;
        }
        tracing::debug!(category = %delta.category, delta = delta.delta, count = adjusted, "applied count delta");
    }

    /// Drain a delta channel into the incremental path. Runs until the
    /// sending side (the realtime subscription) is dropped.
    pub async fn consume_deltas(
        &self,
        mut deltas: tokio::sync::mpsc::UnboundedReceiver<CategoryDelta>,
    ) {
        while let Some(delta) = deltas.recv().await {
            self.apply_delta(&delta).await;
        }
    }

    /// Batch path: recompute every category's count from the full catalog
    /// and overwrite the persisted aggregates in one atomic batch.
    ///
    /// Categories with no active items are explicitly written to zero, not
    /// left stale, and reported in the zero-count set.
    ///
    /// # Errors
    ///
    /// [`ReconciliationError::Scan`] if either full scan fails (nothing was
    /// written); [`ReconciliationError::Commit`] if the batch is rejected
    /// (no partial writes — every prior count stands and the operation is
    /// safe to retry).
    pub async fn synchronize_category_counts(&self) -> Result<SyncReport, ReconciliationError> {
        self.pause().await;
        let categories = self
            .store
            .get_docs(&Query::collection(CATEGORIES_COLLECTION))
            .await
            .map_err(ReconciliationError::Scan)?;
        self.pause().await;
        let products = self
            .store
            .get_docs(&Query::collection(PRODUCTS_COLLECTION))
            .await
            .map_err(ReconciliationError::Scan)?;

        let mut active_counts: BTreeMap<CategoryId, u64> = BTreeMap::new();
        for doc in &products.docs {
            let item = CatalogItem::from_document(doc.id.as_str(), &doc.fields);
            if item.status == ItemStatus::Active {
                *active_counts.entry(item.category).or_default() += 1;
            }
        }

        let now = Timestamp::now();
        let mut batch = self.store.write_batch();
        let mut summary = Vec::with_capacity(categories.len());
        let mut zero_count_categories = Vec::new();
        for doc in &categories.docs {
            let category_id = CategoryId::new(doc.id.as_str());
            let count = active_counts.get(&category_id).copied().unwrap_or(0);
            batch.update(
                CATEGORIES_COLLECTION,
                doc.id.clone(),
                count_fields(count, now),
            );
            if count == 0 {
                zero_count_categories.push(CategoryRef::from_document(doc.id.as_str(), &doc.fields));
            }
            summary.push(CategorySummary { category_id, count });
        }

        self.pause().await;
        batch.commit().await.map_err(ReconciliationError::Commit)?;

        let report = SyncReport {
            updated_categories: summary.len(),
            summary,
            zero_count_categories,
        };
        tracing::info!(
            updated = report.updated_categories,
            zero = report.zero_count_categories.len(),
            "category counts synchronized"
        );
        Ok(report)
    }

    /// Drive the batch path on a fixed interval. Failures are logged and the
    /// loop keeps going; each run is independently retryable.
    pub async fn run_periodic(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so "every 5 minutes"
        // does not mean "also right now at startup".
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = self.synchronize_category_counts().await {
                tracing::warn!(%err, "periodic count synchronization failed");
            }
        }
    }
}

fn count_fields(count: u64, updated_at: Timestamp) -> souq_store::Document {
    let mut fields = souq_store::Document::new();
    fields.insert("productCount".into(), Value::from(count));
    fields.insert("updatedAt".into(), json!(updated_at.to_iso8601()));
    fields
}
