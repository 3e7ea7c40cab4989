//! Group (tab) model

use serde::{Deserialize, Serialize};

use super::ids::{ContainerId, GroupId};

/// A tab inside a notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub container_id: ContainerId,
    pub name: String,
    /// Fixed, always present and not user-deletable
    pub is_staple: bool,
    /// Display order within the notebook
    pub position: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Group {
    /// Create an ordinary tab that only exists on this device
    #[must_use]
    pub fn new_local(container_id: ContainerId, name: impl Into<String>, position: i64) -> Self {
        Self {
            id: GroupId::mint_temporary(),
            container_id,
            name: name.into(),
            is_staple: false,
            position,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn draft(&self) -> GroupDraft {
        GroupDraft {
            container_id: self.container_id.clone(),
            name: self.name.clone(),
            is_staple: self.is_staple,
            position: self.position,
            created_at: self.created_at,
        }
    }
}

/// Create payload for the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDraft {
    pub container_id: ContainerId,
    pub name: String,
    pub is_staple: bool,
    pub position: i64,
    pub created_at: i64,
}
