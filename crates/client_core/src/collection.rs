use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::Entity;
use shared::error::{ApiError, ApiException};
use shared::protocol::{PageEnvelope, PageQuery, SortOrder};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::lifecycle::{FetchCompletion, FetchGeneration, FetchOutcome, FetchTicket};
use crate::query::{FilterSet, IntentError, PageState, QuerySignature, QueryState, SortState};
use crate::store::NormalizedStore;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Store handle shared between a paged collection and any other consumer
/// merging records of the same kind (e.g. a detail view).
pub type SharedStore<T> = Arc<RwLock<NormalizedStore<T>>>;

/// The page-fetch contract supplied by the transport collaborator, one per
/// entity kind.
#[async_trait]
pub trait PageFetcher<T: Entity>: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageEnvelope<T>, ApiException>;
}

pub struct MissingPageFetcher;

#[async_trait]
impl<T: Entity> PageFetcher<T> for MissingPageFetcher {
    async fn fetch_page(&self, _query: &PageQuery) -> Result<PageEnvelope<T>, ApiException> {
        Err(ApiException::unavailable(format!(
            "no {} API configured",
            T::KIND
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Updated { kind: &'static str },
    FetchFailed { kind: &'static str, error: ApiError },
}

/// Read model for a list screen: the current page hydrated from the
/// normalized store, plus everything the table chrome renders.
#[derive(Debug, Clone)]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub total_count: u32,
    pub is_fetching: bool,
    pub error: Option<ApiError>,
    pub filters: FilterSet,
    pub sort: SortState,
    pub page: PageState,
}

struct InflightFetch {
    generation: FetchGeneration,
    signature: QuerySignature,
}

struct CollectionInner<T: Entity> {
    query: QueryState,
    phase: Phase,
    result_ids: Vec<T::Id>,
    total_count: u32,
    error: Option<ApiError>,
    inflight: Option<InflightFetch>,
    last_dispatched: Option<QuerySignature>,
}

impl<T: Entity> CollectionInner<T> {
    fn initial(limit: u32) -> Self {
        Self {
            query: QueryState::new(limit),
            phase: Phase::Idle,
            result_ids: Vec::new(),
            total_count: 0,
            error: None,
            inflight: None,
            last_dispatched: None,
        }
    }
}

/// One long-lived state container per entity kind: pagination, filtering,
/// sorting, fetch status, and the normalized cache behind them.
///
/// All transitions serialize through one async mutex. Fetches run on
/// spawned tasks; their completions re-enter through the same mutex and
/// are dropped unless they carry the newest dispatched generation, so two
/// racing fetches resolve last-dispatched-wins. Lock order where both are
/// taken is `inner` then `store`.
pub struct PagedCollection<T: Entity> {
    fetcher: Arc<dyn PageFetcher<T>>,
    store: SharedStore<T>,
    inner: Mutex<CollectionInner<T>>,
    events: broadcast::Sender<CollectionEvent>,
    generations: AtomicU64,
    default_limit: u32,
}

impl<T: Entity> PagedCollection<T> {
    pub fn new(fetcher: Arc<dyn PageFetcher<T>>) -> Arc<Self> {
        Self::with_store(
            fetcher,
            Arc::new(RwLock::new(NormalizedStore::new())),
            crate::query::DEFAULT_PAGE_LIMIT,
        )
    }

    pub fn with_store(
        fetcher: Arc<dyn PageFetcher<T>>,
        store: SharedStore<T>,
        default_limit: u32,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            fetcher,
            store,
            inner: Mutex::new(CollectionInner::initial(default_limit)),
            events,
            generations: AtomicU64::new(0),
            default_limit,
        })
    }

    pub fn store(&self) -> SharedStore<T> {
        Arc::clone(&self.store)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<CollectionEvent> {
        self.events.clone()
    }

    pub async fn set_filters(self: &Arc<Self>, filters: FilterSet) {
        let mut inner = self.inner.lock().await;
        let next = inner.query.with_filters(filters);
        self.dispatch_locked(&mut inner, next, false);
    }

    pub async fn set_sort(self: &Arc<Self>, key: Option<String>, order: Option<SortOrder>) {
        let mut inner = self.inner.lock().await;
        let next = inner.query.with_sort(key, order);
        self.dispatch_locked(&mut inner, next, false);
    }

    pub async fn set_page(self: &Arc<Self>, offset: u32, limit: u32) -> Result<(), IntentError> {
        let mut inner = self.inner.lock().await;
        let next = inner.query.with_page(offset, limit)?;
        self.dispatch_locked(&mut inner, next, false);
        Ok(())
    }

    /// Re-issues the current query unconditionally. The only way out of
    /// `Failed` with unchanged parameters.
    pub async fn refresh(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        let current = inner.query.clone();
        self.dispatch_locked(&mut inner, current, true);
    }

    /// Drops cached data while keeping the user's filters and sort: store,
    /// result ids, and total count are cleared, the page rewinds to the
    /// first offset, and the collection returns to `Idle`.
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        inner.result_ids.clear();
        inner.total_count = 0;
        inner.phase = Phase::Idle;
        inner.error = None;
        inner.inflight = None;
        inner.last_dispatched = None;
        inner.query.page = PageState::first(inner.query.page.limit);
        self.store.write().await.clear();
        info!(kind = T::KIND, "collection: invalidated");
        let _ = self.events.send(CollectionEvent::Updated { kind: T::KIND });
    }

    /// Full reset to the initial state, filters and sort included. Used
    /// when the user leaves the section owning this collection.
    pub async fn flush(&self) {
        let mut inner = self.inner.lock().await;
        *inner = CollectionInner::initial(self.default_limit);
        self.store.write().await.clear();
        info!(kind = T::KIND, "collection: flushed");
        let _ = self.events.send(CollectionEvent::Updated { kind: T::KIND });
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    /// Snapshot of the current visible page. Each result id is hydrated
    /// from the normalized store at read time, so record updates from
    /// unrelated fetches surface without a refetch. Ids whose record holds
    /// no data yet are skipped.
    pub async fn page_view(&self) -> PageView<T> {
        let inner = self.inner.lock().await;
        let store = self.store.read().await;
        let items = inner
            .result_ids
            .iter()
            .filter_map(|id| store.data(*id).cloned())
            .collect();
        PageView {
            items,
            total_count: inner.total_count,
            is_fetching: inner.phase == Phase::Fetching,
            error: inner.error.clone(),
            filters: inner.query.filters.clone(),
            sort: inner.query.sort.clone(),
            page: inner.query.page,
        }
    }

    /// Single dispatch decision point: adopts the composed query, then
    /// issues at most one fetch for it. Suppressed when the signature
    /// matches an in-flight fetch or the last dispatched one, unless
    /// `force` (refresh).
    fn dispatch_locked(
        self: &Arc<Self>,
        inner: &mut CollectionInner<T>,
        next: QueryState,
        force: bool,
    ) {
        let signature = next.signature();
        inner.query = next;

        if !force {
            if let Some(inflight) = &inner.inflight {
                if inflight.signature == signature {
                    debug!(
                        kind = T::KIND,
                        signature = %signature,
                        "collection: identical fetch already in flight; intent coalesced"
                    );
                    return;
                }
            }
            if inner.last_dispatched.as_ref() == Some(&signature) {
                debug!(
                    kind = T::KIND,
                    signature = %signature,
                    "collection: query unchanged since last dispatch; skipped"
                );
                return;
            }
        }

        let generation = FetchGeneration(self.generations.fetch_add(1, Ordering::Relaxed) + 1);
        let ticket = FetchTicket {
            generation,
            signature: signature.clone(),
            query: inner.query.to_page_query(),
        };
        inner.inflight = Some(InflightFetch {
            generation,
            signature: signature.clone(),
        });
        inner.last_dispatched = Some(signature.clone());
        inner.phase = Phase::Fetching;
        info!(
            kind = T::KIND,
            signature = %signature,
            generation = %generation,
            offset = ticket.query.offset,
            limit = ticket.query.limit,
            "collection: fetch requested"
        );

        let collection = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match collection.fetcher.fetch_page(&ticket.query).await {
                Ok(page) => FetchOutcome::Received(page),
                Err(err) => FetchOutcome::Failed(err),
            };
            collection
                .apply_completion(FetchCompletion { ticket, outcome })
                .await;
        });
    }

    async fn apply_completion(&self, completion: FetchCompletion<T>) {
        let mut inner = self.inner.lock().await;
        let is_current = inner
            .inflight
            .as_ref()
            .is_some_and(|inflight| inflight.generation == completion.ticket.generation);
        if !is_current {
            debug!(
                kind = T::KIND,
                signature = %completion.ticket.signature,
                generation = %completion.ticket.generation,
                "collection: stale response dropped"
            );
            return;
        }
        inner.inflight = None;

        match completion.outcome {
            FetchOutcome::Received(page) => {
                inner.result_ids = page.results.iter().map(Entity::id).collect();
                inner.total_count = page.count;
                inner.phase = Phase::Ready;
                inner.error = None;
                let rows = inner.result_ids.len();
                self.store.write().await.merge_list(page.results);
                info!(
                    kind = T::KIND,
                    rows,
                    total = inner.total_count,
                    "collection: page received"
                );
                let _ = self.events.send(CollectionEvent::Updated { kind: T::KIND });
            }
            FetchOutcome::Failed(err) => {
                warn!(
                    kind = T::KIND,
                    signature = %completion.ticket.signature,
                    "collection: fetch failed: {err}"
                );
                let error = ApiError::from(err);
                inner.error = Some(error.clone());
                inner.phase = Phase::Failed;
                let _ = self.events.send(CollectionEvent::FetchFailed {
                    kind: T::KIND,
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/collection_tests.rs"]
mod tests;
