//! Remote document store contract
//!
//! The remote store is authoritative once a record is durable. The sync core
//! treats it as a fallible, possibly slow, possibly unreachable CRUD oracle.

mod http;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ContainerId, GroupDraft, GroupId, Note, NoteDraft, NotePatch, RecordId};

pub use http::HttpRemoteStore;
pub use memory::{CallCounts, MemoryRemoteStore, RemoteOp};

/// Failures surfaced by a remote store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store unreachable: {0}")]
    NetworkUnavailable(String),
    #[error("Remote record not found: {0}")]
    NotFound(String),
    #[error("Remote store denied access: {0}")]
    PermissionDenied(String),
    #[error("Remote store error: {0}")]
    Unknown(String),
}

impl RemoteError {
    /// Whether the target is permanently gone and retrying is pointless
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Equality filter for remote queries; callers sort the results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub container_id: ContainerId,
    pub group_id: Option<GroupId>,
    pub owner_id: Option<String>,
}

impl RecordQuery {
    pub const fn container(container_id: ContainerId) -> Self {
        Self {
            container_id,
            group_id: None,
            owner_id: None,
        }
    }

    /// Whether `note` satisfies every filter in this query
    pub fn matches(&self, note: &Note) -> bool {
        note.container_id == self.container_id
            && self.group_id.as_ref().is_none_or(|group| &note.group_id == group)
            && self
                .owner_id
                .as_ref()
                .is_none_or(|owner| note.owner_id.as_ref() == Some(owner))
    }
}

/// Operations the sync core needs from the remote document store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a record and return its durable ID
    async fn create_record(&self, draft: &NoteDraft) -> RemoteResult<RecordId>;

    /// Apply a partial update; fails with `NotFound` if `id` does not exist
    async fn update_record(&self, id: &RecordId, patch: &NotePatch) -> RemoteResult<()>;

    /// Records matching the query, unsorted
    async fn query_records(&self, query: &RecordQuery) -> RemoteResult<Vec<Note>>;

    /// Create a group and return its durable ID
    async fn create_group(&self, draft: &GroupDraft) -> RemoteResult<GroupId>;
}
