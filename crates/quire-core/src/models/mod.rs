//! Data models for Quire

mod group;
mod ids;
mod note;
mod patch;

pub use group::{Group, GroupDraft};
pub use ids::{
    ContainerId, GroupId, IdKind, QueueTarget, RecordId, DIAGNOSTIC_PREFIX, STAPLE_GROUP_ID,
    TEMPORARY_GROUP_PREFIX, TEMPORARY_RECORD_PREFIX,
};
pub use note::{Note, NoteDraft};
pub use patch::{Deletion, NotePatch};
