//! Note model

use serde::{Deserialize, Serialize};

use super::ids::{ContainerId, GroupId, RecordId};

/// A note record as cached on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Temporary until the remote store accepts the create, durable afterwards
    pub id: RecordId,
    /// Owning notebook
    pub container_id: ContainerId,
    /// Owning tab; `Staple` for the fixed scratch pad
    pub group_id: GroupId,
    /// Account that owns the note, when known
    pub owner_id: Option<String>,
    pub title: String,
    /// Rich editor payload, stored opaquely
    pub content: String,
    /// Search-indexable text derived from `content`
    pub plain_text: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last edit timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete marker (Unix ms); `None` means active
    pub deleted_at: Option<i64>,
}

impl Note {
    /// Create a note that only exists on this device
    #[must_use]
    pub fn new_local(container_id: ContainerId, group_id: GroupId) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RecordId::mint_temporary(),
            container_id,
            group_id,
            owner_id: None,
            title: String::new(),
            content: String::new(),
            plain_text: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set both the rich payload and its plain-text rendering
    #[must_use]
    pub fn with_body(mut self, content: impl Into<String>, plain_text: impl Into<String>) -> Self {
        self.content = content.into();
        self.plain_text = plain_text.into();
        self
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Payload used to create this note remotely under the given group
    pub fn draft(&self, group_id: &GroupId) -> NoteDraft {
        NoteDraft {
            container_id: self.container_id.clone(),
            group_id: group_id.clone(),
            owner_id: self.owner_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            plain_text: self.plain_text.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// Create payload for the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub container_id: ContainerId,
    pub group_id: GroupId,
    pub owner_id: Option<String>,
    pub title: String,
    pub content: String,
    pub plain_text: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl NoteDraft {
    /// Materialize the note the remote store holds after accepting this draft
    pub fn into_note(self, id: RecordId) -> Note {
        Note {
            id,
            container_id: self.container_id,
            group_id: self.group_id,
            owner_id: self.owner_id,
            title: self.title,
            content: self.content,
            plain_text: self.plain_text,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_local_note_is_temporary_and_active() {
        let note = Note::new_local(ContainerId::new("nb-1"), GroupId::Staple);
        assert!(note.id.is_temporary());
        assert!(!note.is_deleted());
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn draft_uses_given_group() {
        let note = Note::new_local(ContainerId::new("nb-1"), GroupId::mint_temporary())
            .with_title("Hello")
            .with_body("{\"doc\":[]}", "Hello");
        let draft = note.draft(&GroupId::durable("g-1"));

        assert_eq!(draft.group_id, GroupId::durable("g-1"));
        assert_eq!(draft.title, "Hello");

        let remote = draft.into_note(RecordId::durable("n-1"));
        assert_eq!(remote.content, note.content);
        assert_eq!(remote.id, RecordId::durable("n-1"));
    }
}
