//! Partial updates carried by the sync queue

use serde::{Deserialize, Serialize};

use super::ids::GroupId;
use super::note::Note;

/// Change to a note's soft-delete marker
///
/// Clearing `deleted_at` is only possible through [`Deletion::Restore`], so a
/// generic field update can never resurrect a deleted note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Deletion {
    Delete { at: i64 },
    Restore,
}

/// A subset of note fields to write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion: Option<Deletion>,
}

impl NotePatch {
    /// Editable fields of `note`, as written by an editing session
    ///
    /// A deleted note keeps its marker so the patch can replace a queued
    /// soft delete without undoing it.
    pub fn from_edit(note: &Note) -> Self {
        Self {
            title: Some(note.title.clone()),
            content: Some(note.content.clone()),
            plain_text: Some(note.plain_text.clone()),
            updated_at: Some(note.updated_at),
            deletion: note.deleted_at.map(|at| Deletion::Delete { at }),
            ..Self::default()
        }
    }

    pub fn soft_delete(at: i64) -> Self {
        Self {
            updated_at: Some(at),
            deletion: Some(Deletion::Delete { at }),
            ..Self::default()
        }
    }

    pub fn restore(at: i64) -> Self {
        Self {
            updated_at: Some(at),
            deletion: Some(Deletion::Restore),
            ..Self::default()
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.plain_text.is_none()
            && self.group_id.is_none()
            && self.updated_at.is_none()
            && self.deletion.is_none()
    }

    /// Apply this patch to a note in place
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            note.content.clone_from(content);
        }
        if let Some(plain_text) = &self.plain_text {
            note.plain_text.clone_from(plain_text);
        }
        if let Some(group_id) = &self.group_id {
            note.group_id = group_id.clone();
        }
        if let Some(updated_at) = self.updated_at {
            note.updated_at = updated_at;
        }
        match self.deletion {
            Some(Deletion::Delete { at }) => {
                note.deleted_at.get_or_insert(at);
            }
            Some(Deletion::Restore) => note.deleted_at = None,
            None => {}
        }
    }
}
