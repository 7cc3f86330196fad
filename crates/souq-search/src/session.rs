//! # Search Session Controller
//!
//! Owns the filter/sort/pagination state of one browsing session and runs
//! searches against the service. Three concurrency rules, all enforced
//! here:
//!
//! 1. **Cursor invalidation** — any filter or sort mutation resets
//!    pagination to page 1 with no cursor, because the cursor was issued for
//!    the old `(filters, sort, limit)` tuple.
//! 2. **In-flight deduplication** — `execute_search` is idempotent given
//!    unchanged state: a second call while an identical request is in flight
//!    is a no-op.
//! 3. **Stale-response discard** — the most recently *issued* request wins.
//!    Every execution takes a sequence number; a response whose number is no
//!    longer the latest is discarded wholesale, so an earlier search that
//!    resolves late can never clobber a newer one's results.
//!
//! Mutation and execution interleave cooperatively; the state lock is never
//! held across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::SearchError;
use crate::filters::{FilterPatch, PagePatch, PageState, SearchFilters, SortSpec};
use crate::service::{FacetCounts, SearchService};

use souq_core::CatalogItem;

/// Read-only view of the session state, cloned out for rendering.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub filters: SearchFilters,
    pub sort: SortSpec,
    pub page: PageState,
    pub results: Vec<CatalogItem>,
    /// Items seen so far under the current tuple: completed full pages plus
    /// the current page. Not a global catalog count.
    pub total_count: usize,
    pub has_next_page: bool,
    /// Resume point issued by the last successful fetch; feed it back via
    /// [`SearchSession::next_page`] to continue iteration.
    pub next_cursor: Option<souq_store::Cursor>,
    pub is_loading: bool,
    pub error: Option<SearchError>,
    pub facet_counts: Option<FacetCounts>,
}

impl SessionSnapshot {
    /// The UI-facing "No results found" condition: a settled, successful
    /// search that returned nothing.
    pub fn has_no_results(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.results.is_empty()
    }
}

/// The exact request a response belongs to.
#[derive(Debug, Clone, PartialEq)]
struct RequestKey {
    filters: SearchFilters,
    sort: SortSpec,
    page: PageState,
}

#[derive(Default)]
struct SessionState {
    filters: SearchFilters,
    sort: SortSpec,
    page: PageState,
    results: Vec<CatalogItem>,
    total_count: usize,
    has_next_page: bool,
    next_cursor: Option<souq_store::Cursor>,
    is_loading: bool,
    error: Option<SearchError>,
    facet_counts: Option<FacetCounts>,
    in_flight: Option<RequestKey>,
}

struct SessionShared {
    state: Mutex<SessionState>,
    /// Sequence number of the most recently issued request. A resolved
    /// request applies its result only if it still holds this number.
    seq: AtomicU64,
    /// Bumped on every state mutation; lets a debounced sleeper detect that
    /// a newer mutation superseded it.
    generation: AtomicU64,
}

/// Cloneable handle to one browsing session's search state.
#[derive(Clone)]
pub struct SearchSession {
    service: SearchService,
    shared: Arc<SessionShared>,
    debounce: Duration,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("seq", &self.shared.seq.load(Ordering::SeqCst))
            .finish()
    }
}

/// Default settle time before a debounced execution fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

impl SearchSession {
    /// Create a session with the default debounce window.
    pub fn new(service: SearchService) -> Self {
        Self::with_debounce(service, DEFAULT_DEBOUNCE)
    }

    /// Create a session with an explicit debounce window.
    pub fn with_debounce(service: SearchService, debounce: Duration) -> Self {
        Self {
            service,
            shared: Arc::new(SessionShared {
                state: Mutex::new(SessionState::default()),
                seq: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
            debounce,
        }
    }

    /// Merge a partial filter update. Invalidates the pagination cursor.
    pub fn update_filters(&self, patch: FilterPatch) {
        let mut state = self.lock();
        state.filters.apply(patch);
        state.page.invalidate_cursor();
        self.bump_generation();
    }

    /// Replace the sort order. Invalidates the pagination cursor.
    pub fn update_sort(&self, sort: SortSpec) {
        let mut state = self.lock();
        state.sort = sort;
        state.page.invalidate_cursor();
        self.bump_generation();
    }

    /// Merge a partial pagination update (next page, new limit, cursor).
    pub fn update_pagination(&self, patch: PagePatch) {
        let mut state = self.lock();
        state.page.apply(patch);
        self.bump_generation();
    }

    /// Advance to the next page using the cursor issued by the last
    /// successful fetch. A no-op when the last page reported no
    /// continuation.
    pub fn next_page(&self) {
        let mut state = self.lock();
        if !state.has_next_page {
            return;
        }
        if let Some(cursor) = state.next_cursor.clone() {
            state.page.page += 1;
            state.page.cursor = Some(cursor);
            self.bump_generation();
        }
    }

    /// Restore default filters, sort, and pagination; clear results, error,
    /// and facets. Any in-flight request is demoted to stale.
    pub fn reset_search(&self) {
        let mut state = self.lock();
        *state = SessionState::default();
        // Take a fresh sequence number so an in-flight response from before
        // the reset gets discarded on arrival.
        self.shared.seq.fetch_add(1, Ordering::SeqCst);
        self.bump_generation();
    }

    /// Clone out the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            filters: state.filters.clone(),
            sort: state.sort,
            page: state.page.clone(),
            results: state.results.clone(),
            total_count: state.total_count,
            has_next_page: state.has_next_page,
            next_cursor: state.next_cursor.clone(),
            is_loading: state.is_loading,
            error: state.error.clone(),
            facet_counts: state.facet_counts.clone(),
        }
    }

    /// Execute a search for the current state.
    ///
    /// Returns `Ok(())` without querying when an identical request is
    /// already in flight, and silently discards the response when a newer
    /// request was issued while this one was awaiting the store.
    pub async fn execute_search(&self) -> Result<(), SearchError> {
        let (key, my_seq) = {
            let mut state = self.lock();
            let key = RequestKey {
                filters: state.filters.clone(),
                sort: state.sort,
                page: state.page.clone(),
            };
            if state.in_flight.as_ref() == Some(&key) {
                return Ok(());
            }
            state.in_flight = Some(key.clone());
            state.is_loading = true;
            state.error = None;
            let my_seq = self.shared.seq.fetch_add(1, Ordering::SeqCst) + 1;
            (key, my_seq)
        };

        let search = self
            .service
            .search_products(&key.filters, &key.sort, &key.page)
            .await;
        let facets = match &search {
            Ok(_) => Some(self.service.facet_counts(&key.filters).await),
            Err(_) => None,
        };

        let mut state = self.lock();
        if self.shared.seq.load(Ordering::SeqCst) != my_seq {
            // A newer request was issued while this one was in flight; its
            // result is authoritative, ours is dropped wholesale.
            tracing::debug!(seq = my_seq, "discarding stale search response");
            return Ok(());
        }
        state.in_flight = None;
        state.is_loading = false;

        match search {
            Ok(page) => {
                state.total_count = completed_so_far(&key.page) + page.items.len();
                state.results = page.items;
                state.has_next_page = page.has_next_page;
                state.next_cursor = page.next_cursor;
                match facets {
                    Some(Ok(counts)) => {
                        state.facet_counts = Some(counts);
                        Ok(())
                    }
                    Some(Err(err)) => {
                        state.facet_counts = None;
                        state.error = Some(err.clone());
                        Err(err)
                    }
                    None => Ok(()),
                }
            }
            Err(err) => {
                // Prior results stay visible behind the retry affordance.
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Execute after the debounce window, unless a newer mutation arrives
    /// first — in which case this call yields to the newer one's debounced
    /// execution.
    pub async fn execute_search_debounced(&self) -> Result<(), SearchError> {
        let my_generation = self.shared.generation.load(Ordering::SeqCst);
        tokio::time::sleep(self.debounce).await;
        if self.shared.generation.load(Ordering::SeqCst) != my_generation {
            return Ok(());
        }
        self.execute_search().await
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_generation(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Items on the pages already completed before the current one.
fn completed_so_far(page: &PageState) -> usize {
    (page.page.saturating_sub(1) as usize) * page.limit as usize
}
