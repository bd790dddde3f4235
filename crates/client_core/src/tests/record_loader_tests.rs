use super::*;

use chrono::Utc;
use shared::domain::{SampleId, SampleStatus, SampleSummary};
use shared::error::ErrorCode;
use shared::protocol::{PageEnvelope, PageQuery};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use crate::collection::PageFetcher;
use crate::query::{FilterSet, FilterValue};

fn sample(id: i64, name: &str) -> SampleSummary {
    SampleSummary {
        sample_id: SampleId(id),
        specimen_uuid: Uuid::nil(),
        name: name.to_string(),
        status: SampleStatus::Registered,
        container_id: None,
        project_id: None,
        updated_at: Utc::now(),
    }
}

struct FixedPageFetcher {
    rows: Vec<SampleSummary>,
}

#[async_trait]
impl PageFetcher<SampleSummary> for FixedPageFetcher {
    async fn fetch_page(
        &self,
        _query: &PageQuery,
    ) -> Result<PageEnvelope<SampleSummary>, ApiException> {
        Ok(PageEnvelope {
            results: self.rows.clone(),
            count: self.rows.len() as u32,
        })
    }
}

struct FixedRecordFetcher {
    record: SampleSummary,
}

#[async_trait]
impl RecordFetcher<SampleSummary> for FixedRecordFetcher {
    async fn fetch_record(&self, _id: SampleId) -> Result<SampleSummary, ApiException> {
        Ok(self.record.clone())
    }
}

struct FailingRecordFetcher;

#[async_trait]
impl RecordFetcher<SampleSummary> for FailingRecordFetcher {
    async fn fetch_record(&self, _id: SampleId) -> Result<SampleSummary, ApiException> {
        Err(ApiException::new(ErrorCode::NotFound, "sample not found"))
    }
}

/// Blocks until released so a second load can race the first.
struct BlockingRecordFetcher {
    release: Arc<Notify>,
    record: SampleSummary,
}

#[async_trait]
impl RecordFetcher<SampleSummary> for BlockingRecordFetcher {
    async fn fetch_record(&self, _id: SampleId) -> Result<SampleSummary, ApiException> {
        self.release.notified().await;
        Ok(self.record.clone())
    }
}

async fn ready_collection(
    rows: Vec<SampleSummary>,
) -> Arc<PagedCollection<SampleSummary>> {
    let collection = PagedCollection::new(Arc::new(FixedPageFetcher { rows }));
    let mut events = collection.subscribe_events();
    collection
        .set_filters(FilterSet::new().with("status", FilterValue::new("registered")))
        .await;
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for page")
        .expect("event channel closed");
    collection
}

#[tokio::test]
async fn loaded_record_replaces_visible_list_row() {
    let collection = ready_collection(vec![sample(1, "stale name"), sample(2, "other")]).await;
    let loader = RecordLoader::for_collection(
        &collection,
        Arc::new(FixedRecordFetcher {
            record: sample(1, "fresh name"),
        }),
    );

    assert!(loader.load(SampleId(1)).await);

    let view = collection.page_view().await;
    assert_eq!(view.items[0].name, "fresh name");
    assert_eq!(view.items[1].name, "other");
}

#[tokio::test]
async fn failed_load_marks_record_and_keeps_stale_row() {
    let collection = ready_collection(vec![sample(1, "stale name")]).await;
    let loader = RecordLoader::for_collection(&collection, Arc::new(FailingRecordFetcher));

    assert!(loader.load(SampleId(1)).await);

    let store = collection.store();
    let store = store.read().await;
    let record = store.record(SampleId(1)).expect("record exists");
    assert!(record.did_fail);
    assert_eq!(record.error.as_ref().map(|e| e.code), Some(ErrorCode::NotFound));
    assert_eq!(record.data.as_ref().map(|s| s.name.as_str()), Some("stale name"));
}

#[tokio::test]
async fn concurrent_load_for_same_record_is_suppressed() {
    let collection = ready_collection(vec![sample(1, "row")]).await;
    let release = Arc::new(Notify::new());
    let loader = Arc::new(RecordLoader::for_collection(
        &collection,
        Arc::new(BlockingRecordFetcher {
            release: Arc::clone(&release),
            record: sample(1, "row v2"),
        }),
    ));

    let first = {
        let loader = Arc::clone(&loader);
        tokio::spawn(async move { loader.load(SampleId(1)).await })
    };

    // Wait until the first load has marked the record as fetching.
    timeout(Duration::from_secs(2), async {
        loop {
            let store = collection.store();
            let fetching = store
                .read()
                .await
                .record(SampleId(1))
                .is_some_and(|r| r.is_fetching);
            if fetching {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for in-flight load");

    assert!(!loader.load(SampleId(1)).await);

    release.notify_one();
    assert!(first.await.expect("load task panicked"));
    let store = collection.store();
    let store = store.read().await;
    assert_eq!(
        store.data(SampleId(1)).map(|s| s.name.as_str()),
        Some("row v2")
    );
}

#[tokio::test]
async fn detail_load_outside_current_page_stays_invisible() {
    let collection = ready_collection(vec![sample(1, "row")]).await;
    let loader = RecordLoader::for_collection(
        &collection,
        Arc::new(FixedRecordFetcher {
            record: sample(42, "detail only"),
        }),
    );

    assert!(loader.load(SampleId(42)).await);

    let view = collection.page_view().await;
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].sample_id, SampleId(1));
    let store = collection.store();
    assert!(store.read().await.record(SampleId(42)).is_some());
}
