//! # In-Memory Document Store
//!
//! Collections of JSON documents with one-shot queries, live snapshot
//! subscriptions, and atomic write batches.
//!
//! ## Locking
//!
//! One mutex guards the whole store. It is never held across an `.await`
//! and never held while invoking subscription callbacks, so a callback may
//! itself read from or commit to the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::query::{Cursor, DocId, Query};

/// Raw document fields.
pub type Document = Map<String, Value>;

/// One document as returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: DocId,
    pub fields: Document,
}

/// The result of evaluating a query: matching documents in order, plus the
/// cursor that resumes iteration after the last of them.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub docs: Vec<DocumentSnapshot>,
    /// Cursor positioned after the last returned document; `None` for an
    /// empty result.
    pub next_cursor: Option<Cursor>,
}

impl QuerySnapshot {
    /// Number of documents in the snapshot.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the snapshot holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

type ChangeCallback = Arc<dyn Fn(QuerySnapshot) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

struct SubEntry {
    id: u64,
    query: Query,
    last: Vec<DocumentSnapshot>,
    on_change: ChangeCallback,
    on_error: ErrorCallback,
}

#[derive(Default)]
struct StoreInner {
    collections: BTreeMap<String, BTreeMap<DocId, Document>>,
    subscriptions: Vec<SubEntry>,
    next_sub_id: u64,
    closed: bool,
}

/// Handle to the shared in-memory store. Cloning is cheap and clones share
/// the same underlying collections.
#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("DocumentStore")
            .field("collections", &inner.collections.len())
            .field("subscriptions", &inner.subscriptions.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a one-shot query.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] once the store has been closed.
    pub async fn get_docs(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        let inner = lock(&self.inner);
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(evaluate(&inner.collections, query))
    }

    /// Fetch a single document by key.
    pub async fn get_doc(
        &self,
        collection: &str,
        id: &DocId,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        let inner = lock(&self.inner);
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| DocumentSnapshot {
                id: id.clone(),
                fields: fields.clone(),
            }))
    }

    /// Start a write batch against this store.
    pub fn write_batch(&self) -> WriteBatch {
        WriteBatch {
            store: self.clone(),
            ops: Vec::new(),
        }
    }

    /// Open a live subscription.
    ///
    /// `on_change` is invoked once with the currently matching set before
    /// this call returns, then once after every committed batch that changes
    /// the matching set. `on_error` is invoked at most once, when the store
    /// is closed; the subscription is then terminated.
    ///
    /// The returned [`Subscription`] must be released (or dropped) to stop
    /// delivery and free the registration.
    pub fn on_snapshot(
        &self,
        query: Query,
        on_change: impl Fn(QuerySnapshot) + Send + Sync + 'static,
        on_error: impl Fn(StoreError) + Send + Sync + 'static,
    ) -> Subscription {
        let on_change: ChangeCallback = Arc::new(on_change);
        let on_error: ErrorCallback = Arc::new(on_error);

        let (id, initial) = {
            let mut inner = lock(&self.inner);
            if inner.closed {
                drop(inner);
                on_error(StoreError::Closed);
                return Subscription {
                    inner: self.inner.clone(),
                    id: 0,
                    released: true,
                };
            }
            let snapshot = evaluate(&inner.collections, &query);
            let id = inner.next_sub_id;
            inner.next_sub_id += 1;
            inner.subscriptions.push(SubEntry {
                id,
                query,
                last: snapshot.docs.clone(),
                on_change: on_change.clone(),
                on_error,
            });
            (id, snapshot)
        };

        // Initial delivery happens outside the lock, like every other one.
        on_change(initial);

        Subscription {
            inner: self.inner.clone(),
            id,
            released: false,
        }
    }

    /// Close the store: terminate every live subscription (each error
    /// callback fires exactly once) and reject all further reads and
    /// commits.
    pub fn close(&self) {
        let terminated = {
            let mut inner = lock(&self.inner);
            inner.closed = true;
            std::mem::take(&mut inner.subscriptions)
        };
        for entry in terminated {
            (entry.on_error)(StoreError::Closed);
        }
    }
}

/// A set of writes applied atomically.
///
/// `update` requires the target document to exist; a missing target aborts
/// the entire batch at commit time with no partial writes.
#[must_use = "a write batch does nothing until committed"]
pub struct WriteBatch {
    store: DocumentStore,
    ops: Vec<BatchOp>,
}

enum BatchOp {
    Set {
        collection: String,
        id: DocId,
        fields: Document,
    },
    Update {
        collection: String,
        id: DocId,
        fields: Document,
    },
    Delete {
        collection: String,
        id: DocId,
    },
}

impl WriteBatch {
    /// Create or replace a document.
    pub fn set(&mut self, collection: impl Into<String>, id: DocId, fields: Document) {
        self.ops.push(BatchOp::Set {
            collection: collection.into(),
            id,
            fields,
        });
    }

    /// Merge fields into an existing document.
    pub fn update(&mut self, collection: impl Into<String>, id: DocId, fields: Document) {
        self.ops.push(BatchOp::Update {
            collection: collection.into(),
            id,
            fields,
        });
    }

    /// Delete a document. Deleting a missing document is a no-op.
    pub fn delete(&mut self, collection: impl Into<String>, id: DocId) {
        self.ops.push(BatchOp::Delete {
            collection: collection.into(),
            id,
        });
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch holds no writes.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued write, or none of them.
    ///
    /// Subscriptions whose matching set changed are notified after the lock
    /// is released.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Closed`] if the store has been closed.
    /// - [`StoreError::MissingDocument`] if an `update` targets a missing
    ///   document; the whole batch aborts before any write is visible.
    pub async fn commit(self) -> Result<(), StoreError> {
        let mut notifications: Vec<(ChangeCallback, QuerySnapshot)> = Vec::new();
        {
            let mut inner = lock(&self.store.inner);
            if inner.closed {
                return Err(StoreError::Closed);
            }

            // Validate before mutating anything.
            for op in &self.ops {
                if let BatchOp::Update { collection, id, .. } = op {
                    let exists = inner
                        .collections
                        .get(collection)
                        .is_some_and(|docs| docs.contains_key(id));
                    if !exists {
                        return Err(StoreError::MissingDocument {
                            collection: collection.clone(),
                            id: id.as_str().to_string(),
                        });
                    }
                }
            }

            for op in self.ops {
                match op {
                    BatchOp::Set {
                        collection,
                        id,
                        fields,
                    } => {
                        inner
                            .collections
                            .entry(collection)
                            .or_default()
                            .insert(id, fields);
                    }
                    BatchOp::Update {
                        collection,
                        id,
                        fields,
                    } => {
                        // Existence validated above.
                        if let Some(doc) = inner
                            .collections
                            .get_mut(&collection)
                            .and_then(|docs| docs.get_mut(&id))
                        {
                            for (k, v) in fields {
                                doc.insert(k, v);
                            }
                        }
                    }
                    BatchOp::Delete { collection, id } => {
                        if let Some(docs) = inner.collections.get_mut(&collection) {
                            docs.remove(&id);
                        }
                    }
                }
            }

            let StoreInner {
                collections,
                subscriptions,
                ..
            } = &mut *inner;
            for entry in subscriptions.iter_mut() {
                let snapshot = evaluate(collections, &entry.query);
                if snapshot.docs != entry.last {
                    entry.last = snapshot.docs.clone();
                    notifications.push((entry.on_change.clone(), snapshot));
                }
            }
        }

        for (on_change, snapshot) in notifications {
            on_change(snapshot);
        }
        Ok(())
    }
}

/// Live subscription handle. Releasing (or dropping) it stops delivery and
/// frees the registration inside the store.
pub struct Subscription {
    inner: Arc<Mutex<StoreInner>>,
    id: u64,
    released: bool,
}

impl Subscription {
    /// Stop delivery and free the registration.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut inner = lock(&self.inner);
        inner.subscriptions.retain(|entry| entry.id != self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

fn lock(inner: &Mutex<StoreInner>) -> MutexGuard<'_, StoreInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Evaluate a query against the current collections: filter, sort, resume
/// after the cursor, truncate to the limit.
fn evaluate(
    collections: &BTreeMap<String, BTreeMap<DocId, Document>>,
    query: &Query,
) -> QuerySnapshot {
    let mut docs: Vec<DocumentSnapshot> = collections
        .get(&query.collection)
        .map(|docs| {
            docs.iter()
                .filter(|(_, fields)| query.matches(fields))
                .map(|(id, fields)| DocumentSnapshot {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    docs.sort_by(|a, b| {
        query.position_cmp(
            query.sort_key(&a.fields),
            &a.id,
            query.sort_key(&b.fields),
            &b.id,
        )
    });

    if let Some(cursor) = &query.start_after {
        // Resume after the cursor's *position*, which stays well-defined
        // even if the cursor document was deleted in the meantime.
        let skip = docs.partition_point(|d| {
            query.position_cmp(
                query.sort_key(&d.fields),
                &d.id,
                cursor.sort_key.as_ref(),
                &cursor.doc_id,
            ) != std::cmp::Ordering::Greater
        });
        docs.drain(..skip);
    }

    if let Some(n) = query.limit {
        docs.truncate(n);
    }

    let next_cursor = docs.last().map(|d| Cursor {
        doc_id: d.id.clone(),
        sort_key: query.sort_key(&d.fields).cloned(),
    });

    QuerySnapshot { docs, next_cursor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Direction, Filter, FilterOp};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn fields(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn seed(store: &DocumentStore, docs: &[(&str, Value)]) {
        let mut batch = store.write_batch();
        for (id, value) in docs {
            batch.set("products", DocId::from(*id), fields(value.clone()));
        }
        batch.commit().await.unwrap();
    }

    fn ids(snapshot: &QuerySnapshot) -> Vec<&str> {
        snapshot.docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_order_and_limit() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("a", json!({ "price": 30 })),
                ("b", json!({ "price": 10 })),
                ("c", json!({ "price": 20 })),
            ],
        )
        .await;
        let q = Query::collection("products")
            .order_by("price", Direction::Ascending)
            .limit(2);
        let snap = store.get_docs(&q).await.unwrap();
        assert_eq!(ids(&snap), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_missing_sort_field_sorts_last() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("a", json!({ "price": 30 })),
                ("b", json!({ "title": "no price" })),
                ("c", json!({ "price": 20 })),
            ],
        )
        .await;
        let q = Query::collection("products").order_by("price", Direction::Descending);
        let snap = store.get_docs(&q).await.unwrap();
        assert_eq!(ids(&snap), vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_cursor_resumes_iteration() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("a", json!({ "price": 10 })),
                ("b", json!({ "price": 20 })),
                ("c", json!({ "price": 30 })),
                ("d", json!({ "price": 40 })),
            ],
        )
        .await;
        let base = Query::collection("products").order_by("price", Direction::Ascending);
        let first = store.get_docs(&base.clone().limit(2)).await.unwrap();
        assert_eq!(ids(&first), vec!["a", "b"]);

        let cursor = first.next_cursor.clone().unwrap();
        let second = store
            .get_docs(&base.clone().limit(2).start_after(cursor))
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_cursor_survives_deletion_of_cursor_document() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("a", json!({ "price": 10 })),
                ("b", json!({ "price": 20 })),
                ("c", json!({ "price": 30 })),
            ],
        )
        .await;
        let base = Query::collection("products").order_by("price", Direction::Ascending);
        let first = store.get_docs(&base.clone().limit(2)).await.unwrap();
        let cursor = first.next_cursor.clone().unwrap();

        let mut batch = store.write_batch();
        batch.delete("products", DocId::from("b"));
        batch.commit().await.unwrap();

        let second = store.get_docs(&base.clone().start_after(cursor)).await.unwrap();
        assert_eq!(ids(&second), vec!["c"]);
    }

    #[tokio::test]
    async fn test_ties_broken_by_id() {
        let store = DocumentStore::new();
        seed(
            &store,
            &[
                ("b", json!({ "price": 10 })),
                ("a", json!({ "price": 10 })),
                ("c", json!({ "price": 10 })),
            ],
        )
        .await;
        let base = Query::collection("products").order_by("price", Direction::Ascending);
        let first = store.get_docs(&base.clone().limit(2)).await.unwrap();
        assert_eq!(ids(&first), vec!["a", "b"]);
        let second = store
            .get_docs(&base.clone().start_after(first.next_cursor.clone().unwrap()))
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["c"]);
    }

    #[tokio::test]
    async fn test_batch_update_missing_document_aborts_whole_batch() {
        let store = DocumentStore::new();
        seed(&store, &[("a", json!({ "price": 10 }))]).await;

        let mut batch = store.write_batch();
        batch.set("products", DocId::from("b"), fields(json!({ "price": 20 })));
        batch.update("products", DocId::from("ghost"), fields(json!({ "price": 1 })));
        let err = batch.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::MissingDocument { .. }));

        // The set in the same batch must not have landed.
        let snap = store
            .get_docs(&Query::collection("products"))
            .await
            .unwrap();
        assert_eq!(ids(&snap), vec!["a"]);
    }

    #[tokio::test]
    async fn test_subscription_initial_and_change_delivery() {
        let store = DocumentStore::new();
        seed(&store, &[("a", json!({ "status": "active" }))]).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = calls.clone();
        let q = Query::collection("products")
            .filter(Filter::new("status", FilterOp::In, json!(["active"])).unwrap());
        let sub = store.on_snapshot(
            q,
            move |_snap| {
                calls_cb.fetch_add(1, AtomicOrdering::SeqCst);
            },
            |_err| {},
        );
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        seed(&store, &[("b", json!({ "status": "active" }))]).await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);

        // A write that does not change the matching set is not delivered.
        seed(&store, &[("c", json!({ "status": "removed" }))]).await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);

        sub.release();
        seed(&store, &[("d", json!({ "status": "active" }))]).await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_delivers_error_exactly_once() {
        let store = DocumentStore::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_cb = errors.clone();
        let _sub = store.on_snapshot(
            Query::collection("products"),
            |_snap| {},
            move |err| {
                assert_eq!(err, StoreError::Closed);
                errors_cb.fetch_add(1, AtomicOrdering::SeqCst);
            },
        );
        store.close();
        store.close();
        assert_eq!(errors.load(AtomicOrdering::SeqCst), 1);

        let mut batch = store.write_batch();
        batch.set("products", DocId::from("x"), Document::new());
        assert_eq!(batch.commit().await.unwrap_err(), StoreError::Closed);
    }

    #[tokio::test]
    async fn test_callback_runs_outside_lock() {
        // A callback that touches the store lock (Debug formatting does)
        // must not deadlock against the committing batch.
        let store = DocumentStore::new();
        let probe = store.clone();
        let _sub = store.on_snapshot(
            Query::collection("products"),
            move |_snap| {
                let _ = format!("{probe:?}");
            },
            |_err| {},
        );
        seed(&store, &[("a", json!({ "price": 1 }))]).await;
    }
}
