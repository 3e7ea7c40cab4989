//! Read policy for notes.
//!
//! Callers ask for notes once; the reader decides between the remote store
//! and the local cache based on connectivity, and keeps the cache warm.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ContainerId, GroupId, Note, QueueTarget};
use crate::remote::{RecordQuery, RemoteStore};
use crate::services::LocalStore;
use crate::sync::ConnectivityGate;

/// Which notes to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub container_id: ContainerId,
    pub group_id: Option<GroupId>,
    pub owner_id: Option<String>,
    /// Also return soft-deleted notes
    pub include_deleted: bool,
}

impl NoteQuery {
    pub const fn container(container_id: ContainerId) -> Self {
        Self {
            container_id,
            group_id: None,
            owner_id: None,
            include_deleted: false,
        }
    }

    #[must_use]
    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    #[must_use]
    pub const fn with_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    fn remote(&self) -> RecordQuery {
        RecordQuery {
            container_id: self.container_id.clone(),
            group_id: self.group_id.clone(),
            owner_id: self.owner_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NoteReader {
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
    gate: ConnectivityGate,
}

impl NoteReader {
    pub fn new(local: LocalStore, remote: Arc<dyn RemoteStore>, gate: ConnectivityGate) -> Self {
        Self {
            local,
            remote,
            gate,
        }
    }

    /// Notes matching `query`, most recently updated first.
    ///
    /// Online reads go to the remote store and fall back to the cache when the
    /// remote call fails. Notes with queued writes are always served from the
    /// cache, since the local copy is newer than anything remote.
    pub async fn read(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        let mut notes = if self.gate.is_online() {
            match self.remote.query_records(&query.remote()).await {
                Ok(remote_notes) => self.merge_remote(query, remote_notes).await?,
                Err(error) => {
                    tracing::warn!("Remote read failed, serving cached notes: {error}");
                    self.read_local(query).await?
                }
            }
        } else {
            self.read_local(query).await?
        };

        if !query.include_deleted {
            notes.retain(|note| !note.is_deleted());
        }
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    async fn read_local(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        let remote_query = query.remote();
        let mut notes = self.local.get_all().await?;
        notes.retain(|note| remote_query.matches(note));
        Ok(notes)
    }

    async fn merge_remote(&self, query: &NoteQuery, remote_notes: Vec<Note>) -> Result<Vec<Note>> {
        let pending: HashSet<QueueTarget> = self
            .local
            .list_pending()
            .await?
            .into_iter()
            .map(|entry| entry.target)
            .collect();

        let mut merged: HashMap<String, Note> = HashMap::new();
        let mut cached = 0_usize;
        for remote_note in remote_notes {
            let key = remote_note.id.as_str().to_string();
            let local_note = self.local.get(&remote_note.id).await?;
            let has_pending = pending.contains(&QueueTarget::Record(remote_note.id.clone()));

            let winner = match local_note {
                Some(local_note)
                    if has_pending || local_note.updated_at > remote_note.updated_at =>
                {
                    local_note
                }
                _ => {
                    self.local.put(&remote_note).await?;
                    cached += 1;
                    remote_note
                }
            };
            merged.insert(key, winner);
        }

        // Notes created offline are not known remotely yet.
        for local_note in self.read_local(query).await? {
            if local_note.id.is_temporary() {
                merged.insert(local_note.id.as_str().to_string(), local_note);
            }
        }

        tracing::debug!(cached, total = merged.len(), "Merged remote read");
        Ok(merged.into_values().collect())
    }
}
