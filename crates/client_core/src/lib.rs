use std::sync::Arc;

use shared::domain::{ContainerSummary, Entity, ProjectSummary, SampleSummary, WorkflowSummary};

pub mod collection;
pub mod lifecycle;
pub mod query;
pub mod record_loader;
pub mod store;

pub use collection::{
    CollectionEvent, MissingPageFetcher, PageFetcher, PageView, PagedCollection, Phase,
    SharedStore,
};
pub use lifecycle::{FetchCompletion, FetchGeneration, FetchOutcome, FetchTicket};
pub use query::{
    FilterSet, FilterValue, IntentError, PageState, QuerySignature, QueryState, SortState,
    DEFAULT_PAGE_LIMIT,
};
pub use record_loader::{MissingRecordFetcher, RecordFetcher, RecordLoader};
pub use store::{EntityRecord, NormalizedStore};

/// Typed fetchers for every entity kind the client lists, supplied by the
/// transport collaborator.
pub trait LabApi: Send + Sync {
    fn container_pages(&self) -> Arc<dyn PageFetcher<ContainerSummary>>;
    fn container_records(&self) -> Arc<dyn RecordFetcher<ContainerSummary>>;
    fn sample_pages(&self) -> Arc<dyn PageFetcher<SampleSummary>>;
    fn sample_records(&self) -> Arc<dyn RecordFetcher<SampleSummary>>;
    fn workflow_pages(&self) -> Arc<dyn PageFetcher<WorkflowSummary>>;
    fn workflow_records(&self) -> Arc<dyn RecordFetcher<WorkflowSummary>>;
    fn project_pages(&self) -> Arc<dyn PageFetcher<ProjectSummary>>;
    fn project_records(&self) -> Arc<dyn RecordFetcher<ProjectSummary>>;
}

/// Null API used before a transport is wired in; every fetch reports the
/// backend as unavailable.
pub struct MissingLabApi;

impl LabApi for MissingLabApi {
    fn container_pages(&self) -> Arc<dyn PageFetcher<ContainerSummary>> {
        Arc::new(MissingPageFetcher)
    }

    fn container_records(&self) -> Arc<dyn RecordFetcher<ContainerSummary>> {
        Arc::new(MissingRecordFetcher)
    }

    fn sample_pages(&self) -> Arc<dyn PageFetcher<SampleSummary>> {
        Arc::new(MissingPageFetcher)
    }

    fn sample_records(&self) -> Arc<dyn RecordFetcher<SampleSummary>> {
        Arc::new(MissingRecordFetcher)
    }

    fn workflow_pages(&self) -> Arc<dyn PageFetcher<WorkflowSummary>> {
        Arc::new(MissingPageFetcher)
    }

    fn workflow_records(&self) -> Arc<dyn RecordFetcher<WorkflowSummary>> {
        Arc::new(MissingRecordFetcher)
    }

    fn project_pages(&self) -> Arc<dyn PageFetcher<ProjectSummary>> {
        Arc::new(MissingPageFetcher)
    }

    fn project_records(&self) -> Arc<dyn RecordFetcher<ProjectSummary>> {
        Arc::new(MissingRecordFetcher)
    }
}

/// List controller and detail loader for one entity kind, sharing one
/// normalized store.
pub struct CollectionHandle<T: Entity> {
    pub list: Arc<PagedCollection<T>>,
    pub detail: RecordLoader<T>,
}

impl<T: Entity> CollectionHandle<T> {
    pub fn new(pages: Arc<dyn PageFetcher<T>>, records: Arc<dyn RecordFetcher<T>>) -> Self {
        let list = PagedCollection::new(pages);
        let detail = RecordLoader::for_collection(&list, records);
        Self { list, detail }
    }
}

/// Application-level cache context: one collection handle per entity kind,
/// created once at startup and passed by reference for the session.
pub struct LabClient {
    pub containers: CollectionHandle<ContainerSummary>,
    pub samples: CollectionHandle<SampleSummary>,
    pub workflows: CollectionHandle<WorkflowSummary>,
    pub projects: CollectionHandle<ProjectSummary>,
}

impl LabClient {
    pub fn new(api: &dyn LabApi) -> Self {
        Self {
            containers: CollectionHandle::new(api.container_pages(), api.container_records()),
            samples: CollectionHandle::new(api.sample_pages(), api.sample_records()),
            workflows: CollectionHandle::new(api.workflow_pages(), api.workflow_records()),
            projects: CollectionHandle::new(api.project_pages(), api.project_records()),
        }
    }

    pub fn disconnected() -> Self {
        Self::new(&MissingLabApi)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
