use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::Entity;
use shared::error::ApiException;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::collection::{CollectionEvent, PagedCollection, SharedStore};

/// Single-record fetch contract, the detail-view counterpart of
/// `PageFetcher`.
#[async_trait]
pub trait RecordFetcher<T: Entity>: Send + Sync {
    async fn fetch_record(&self, id: T::Id) -> Result<T, ApiException>;
}

pub struct MissingRecordFetcher;

#[async_trait]
impl<T: Entity> RecordFetcher<T> for MissingRecordFetcher {
    async fn fetch_record(&self, id: T::Id) -> Result<T, ApiException> {
        Err(ApiException::unavailable(format!(
            "no {} API configured for record {id}",
            T::KIND
        )))
    }
}

/// Detail-view loader writing through to a collection's normalized store.
///
/// A loaded record immediately replaces the matching list row in any
/// visible page, because pages hydrate from the same store at read time.
/// Fetch outcomes land on the record's own status flags; `load` never
/// surfaces a transport error to the caller.
pub struct RecordLoader<T: Entity> {
    fetcher: Arc<dyn RecordFetcher<T>>,
    store: SharedStore<T>,
    events: broadcast::Sender<CollectionEvent>,
}

impl<T: Entity> RecordLoader<T> {
    pub fn for_collection(
        collection: &PagedCollection<T>,
        fetcher: Arc<dyn RecordFetcher<T>>,
    ) -> Self {
        Self {
            fetcher,
            store: collection.store(),
            events: collection.event_sender(),
        }
    }

    /// Fetches one record and merges it into the shared store. Returns
    /// false when a fetch for the same id is already outstanding (at most
    /// one in-flight fetch per record).
    pub async fn load(&self, id: T::Id) -> bool {
        {
            let mut store = self.store.write().await;
            if store.record(id).is_some_and(|record| record.is_fetching) {
                debug!(
                    kind = T::KIND,
                    id = %id,
                    "record: fetch already in flight; load suppressed"
                );
                return false;
            }
            store.mark_fetching(id);
        }
        info!(kind = T::KIND, id = %id, "record: fetch requested");

        match self.fetcher.fetch_record(id).await {
            Ok(data) => {
                self.store.write().await.merge_record(data);
                info!(kind = T::KIND, id = %id, "record: received");
            }
            Err(err) => {
                warn!(kind = T::KIND, id = %id, "record: fetch failed: {err}");
                self.store.write().await.mark_failed(id, err.into());
            }
        }
        let _ = self.events.send(CollectionEvent::Updated { kind: T::KIND });
        true
    }
}

#[cfg(test)]
#[path = "tests/record_loader_tests.rs"]
mod tests;
