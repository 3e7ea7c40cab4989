use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quire_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Invalid group id: {0}")]
    InvalidGroup(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Sync is not configured. Set QUIRE_REMOTE_URL (and QUIRE_AUTH_TOKEN) to enable `quire sync`.")]
    SyncNotConfigured,
    #[error("Offline mode is on; pending writes stay queued")]
    Offline,
}
