use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ContainerId);
id_newtype!(SampleId);
id_newtype!(WorkflowId);
id_newtype!(ProjectId);

/// A domain object addressable by a stable per-kind identifier.
///
/// Every list/table screen in the client caches objects of one kind in a
/// normalized store keyed by this identifier.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Kind label used for endpoint paths and log fields.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Tube,
    Rack,
    Plate96,
    Plate384,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Registered,
    InProgress,
    Completed,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub container_id: ContainerId,
    pub barcode: String,
    pub kind: ContainerKind,
    pub name: String,
    pub sample_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Entity for ContainerSummary {
    type Id = ContainerId;

    const KIND: &'static str = "containers";

    fn id(&self) -> ContainerId {
        self.container_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub sample_id: SampleId,
    /// Globally unique specimen identifier assigned at registration.
    pub specimen_uuid: Uuid,
    pub name: String,
    pub status: SampleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for SampleSummary {
    type Id = SampleId;

    const KIND: &'static str = "samples";

    fn id(&self) -> SampleId {
        self.sample_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub status: WorkflowStatus,
    pub step_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Entity for WorkflowSummary {
    type Id = WorkflowId;

    const KIND: &'static str = "workflows";

    fn id(&self) -> WorkflowId {
        self.workflow_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub name: String,
    pub sample_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Entity for ProjectSummary {
    type Id = ProjectId;

    const KIND: &'static str = "projects";

    fn id(&self) -> ProjectId {
        self.project_id
    }
}
