//! The per-process sync service.
//!
//! One explicitly constructed instance owns the local store, the remote
//! store, connectivity, notifications and the drain scheduler. Front-ends
//! create notes, open editing sessions and read through it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::config::SyncSettings;
use crate::editor::{
    is_placeholder, unique_title, EditSession, EditorSettings, SessionContext, SyncedCallback,
    DEFAULT_TITLE,
};
use crate::error::{Error, Result};
use crate::models::{
    ContainerId, Deletion, Group, GroupId, Note, NotePatch, QueueTarget, RecordId,
};
use crate::remote::RemoteStore;
use crate::repository::{NoteQuery, NoteReader};
use crate::sync::{
    ConnectivityGate, DrainReport, DrainTrigger, SyncEvent, SyncEvents, SyncHandle,
    SyncQueueProcessor, SyncScheduler,
};
use crate::util::now_millis;

use super::LocalStore;

pub struct SyncService {
    ctx: SessionContext,
    processor: Arc<SyncQueueProcessor>,
    drain_interval: Duration,
    scheduler: Mutex<Option<SyncHandle>>,
}

impl SyncService {
    /// Build a service with default timings.
    pub fn new(local: LocalStore, remote: Arc<dyn RemoteStore>, online: bool) -> Self {
        Self::build(
            local,
            remote,
            online,
            EditorSettings::default(),
            SyncSettings::default().drain_interval(),
        )
    }

    /// Build a service from loaded settings.
    pub fn from_settings(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        settings: &SyncSettings,
    ) -> Self {
        Self::build(
            local,
            remote,
            settings.starts_online(),
            settings.editor(),
            settings.drain_interval(),
        )
    }

    fn build(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        online: bool,
        editor: EditorSettings,
        drain_interval: Duration,
    ) -> Self {
        let gate = ConnectivityGate::new(online);
        let events = SyncEvents::new();
        let processor = Arc::new(SyncQueueProcessor::new(
            local.clone(),
            remote.clone(),
            gate.clone(),
            events.clone(),
        ));
        Self {
            ctx: SessionContext {
                local,
                remote,
                gate,
                events,
                trigger: DrainTrigger::new(),
                settings: editor,
            },
            processor,
            drain_interval,
            scheduler: Mutex::new(None),
        }
    }

    /// Start background draining; a no-op when already running.
    pub async fn start(&self) {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_none() {
            *scheduler = Some(
                SyncScheduler::new(
                    self.processor.clone(),
                    self.ctx.gate.clone(),
                    self.drain_interval,
                    self.ctx.trigger.clone(),
                )
                .spawn(),
            );
        }
    }

    /// Stop background draining after any in-flight drain.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().await.take() {
            handle.shutdown().await;
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.ctx.local
    }

    pub fn gate(&self) -> &ConnectivityGate {
        &self.ctx.gate
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.ctx.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.ctx.gate.is_online()
    }

    /// Feed the platform's network status into the gate.
    pub fn set_online(&self, online: bool) -> bool {
        self.ctx.gate.set_online(online)
    }

    /// Number of writes waiting for the remote store.
    pub async fn pending_count(&self) -> Result<usize> {
        self.ctx.local.pending_count().await
    }

    /// Ask the scheduler for a drain without waiting for it.
    pub fn request_drain(&self) {
        self.ctx.trigger.request_drain();
    }

    /// Drain the queue on the calling task.
    pub async fn drain_now(&self) -> Result<Option<DrainReport>> {
        self.processor.drain().await
    }

    pub fn reader(&self) -> NoteReader {
        NoteReader::new(
            self.ctx.local.clone(),
            self.ctx.remote.clone(),
            self.ctx.gate.clone(),
        )
    }

    pub async fn list_notes(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        self.reader().read(query).await
    }

    /// Look a note up by any ID it has had.
    pub async fn get_note(&self, id: &RecordId) -> Result<Option<Note>> {
        let id = self.ctx.local.resolve_id(id).await?;
        self.ctx.local.get(&id).await
    }

    pub async fn list_groups(&self, container_id: &ContainerId) -> Result<Vec<Group>> {
        self.ctx.local.list_groups(container_id).await
    }

    /// Create a note on this device and queue its remote creation.
    ///
    /// The note keeps a temporary ID until a drain promotes it. Placeholder
    /// titles are replaced with a unique one among the notebook's notes.
    pub async fn create_note(
        &self,
        container_id: ContainerId,
        group_id: GroupId,
        title: &str,
        content: &str,
        plain_text: &str,
    ) -> Result<Note> {
        let group_id = match group_id {
            GroupId::Staple => GroupId::Staple,
            other => self
                .ctx
                .local
                .get_group(&other)
                .await?
                .map(|group| group.id)
                .ok_or_else(|| Error::NotFound(format!("group {other}")))?,
        };

        let mut note = Note::new_local(container_id, group_id).with_body(content, plain_text);
        note.title = if is_placeholder(title) {
            self.unique_title_in(&note.container_id, title).await?
        } else {
            title.trim().to_string()
        };

        note.id = self.ctx.local.put(&note).await?;
        self.ctx
            .local
            .enqueue(&QueueTarget::Record(note.id.clone()), &NotePatch::from_edit(&note))
            .await?;
        tracing::info!("Created note {} ({})", note.id, note.title);
        self.ctx.trigger.request_drain();
        Ok(note)
    }

    /// Create a user tab with its own note.
    ///
    /// Both carry temporary IDs; the tab is created remotely together with
    /// the note when the note is promoted.
    pub async fn create_tab(&self, container_id: ContainerId, name: &str) -> Result<(Group, Note)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("tab name must not be empty".to_string()));
        }

        let position = i64::try_from(self.ctx.local.list_groups(&container_id).await?.len())
            .map_err(|_| Error::InvalidInput("too many tabs".to_string()))?;
        let group = Group::new_local(container_id.clone(), name, position);
        self.ctx.local.put_group(&group).await?;
        let note = self
            .create_note(container_id, group.id.clone(), name, "", "")
            .await?;
        Ok((group, note))
    }

    /// Mark a note deleted; it stays restorable until purged.
    pub async fn soft_delete(&self, id: &RecordId) -> Result<Note> {
        let at = now_millis();
        self.update_deletion(id, Deletion::Delete { at }, at).await
    }

    pub async fn restore(&self, id: &RecordId) -> Result<Note> {
        self.update_deletion(id, Deletion::Restore, now_millis()).await
    }

    /// Remove a soft-deleted note from this device, with any queued write.
    ///
    /// The remote copy keeps its delete marker.
    pub async fn purge(&self, id: &RecordId) -> Result<()> {
        let note = self.require_note(id).await?;
        if !note.is_deleted() {
            return Err(Error::InvalidInput(format!(
                "note {} must be deleted before it is purged",
                note.id
            )));
        }
        if note.id.is_temporary() {
            tracing::info!("Purging {} before it ever reached the remote store", note.id);
        }
        self.ctx
            .local
            .dequeue(&QueueTarget::Record(note.id.clone()))
            .await?;
        self.ctx.local.delete(&note.id).await?;
        Ok(())
    }

    /// Open an editing session for a note.
    pub async fn open_session(&self, id: &RecordId) -> Result<EditSession> {
        self.open_session_with(id, None).await
    }

    /// Open an editing session that reports successful remote writes.
    pub async fn open_session_with(
        &self,
        id: &RecordId,
        on_synced: Option<SyncedCallback>,
    ) -> Result<EditSession> {
        let note = self.require_note(id).await?;
        Ok(EditSession::open(self.ctx.clone(), note, on_synced))
    }

    async fn require_note(&self, id: &RecordId) -> Result<Note> {
        self.get_note(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {id}")))
    }

    async fn update_deletion(&self, id: &RecordId, deletion: Deletion, at: i64) -> Result<Note> {
        let mut note = self.require_note(id).await?;
        let mut patch = NotePatch::from_edit(&note);
        patch.updated_at = Some(at);
        patch.deletion = Some(deletion);
        patch.apply_to(&mut note);

        note.id = self.ctx.local.put(&note).await?;
        self.ctx.push(&note, &patch).await?;
        Ok(note)
    }

    async fn unique_title_in(&self, container_id: &ContainerId, title: &str) -> Result<String> {
        let notes = self.ctx.local.get_all().await?;
        let base = if title.trim().is_empty() {
            DEFAULT_TITLE
        } else {
            title
        };
        Ok(unique_title(
            base,
            notes
                .iter()
                .filter(|note| &note.container_id == container_id && !note.is_deleted())
                .map(|note| note.title.as_str()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemoteStore, RemoteError, RemoteOp};
    use pretty_assertions::assert_eq;

    fn service(online: bool) -> (SyncService, Arc<MemoryRemoteStore>) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = SyncService::new(LocalStore::open_in_memory().unwrap(), remote.clone(), online);
        (service, remote)
    }

    fn notebook() -> ContainerId {
        ContainerId::new("nb-1")
    }

    #[tokio::test]
    async fn offline_note_gets_durable_id_after_reconnect() {
        let (service, remote) = service(false);
        let note = service
            .create_note(notebook(), GroupId::Staple, "Hello", "<p>Hi</p>", "Hi")
            .await
            .unwrap();
        assert!(note.id.is_temporary());
        assert_eq!(service.pending_count().await.unwrap(), 1);

        assert!(service.drain_now().await.unwrap().is_none());
        service.set_online(true);
        service.drain_now().await.unwrap();

        let notes = service.local().get_all().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].id.is_temporary());
        assert_eq!(notes[0].title, "Hello");
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(remote.records().len(), 1);

        let by_old_id = service.get_note(&note.id).await.unwrap().unwrap();
        assert_eq!(by_old_id.id, notes[0].id);
    }

    #[tokio::test]
    async fn placeholder_titles_are_numbered() {
        let (service, _) = service(false);
        let first = service
            .create_note(notebook(), GroupId::Staple, "New Note", "", "")
            .await
            .unwrap();
        let second = service
            .create_note(notebook(), GroupId::Staple, "", "", "")
            .await
            .unwrap();
        assert_eq!(first.title, "Note1");
        assert_eq!(second.title, "Note2");
    }

    #[tokio::test]
    async fn tab_and_note_are_promoted_together() {
        let (service, remote) = service(true);
        let (group, note) = service.create_tab(notebook(), "Work").await.unwrap();
        assert!(group.id.is_temporary());

        let report = service.drain_now().await.unwrap().unwrap();
        assert_eq!(report.promoted, 1);

        let stored = service.get_note(&note.id).await.unwrap().unwrap();
        assert!(!stored.group_id.is_temporary());
        assert_eq!(remote.group(&stored.group_id).unwrap().name, "Work");
        let groups = service.list_groups(&notebook()).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, stored.group_id);
    }

    #[tokio::test]
    async fn note_in_unknown_group_is_rejected() {
        let (service, _) = service(false);
        let result = service
            .create_note(notebook(), GroupId::durable("g-404"), "x", "", "")
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn soft_delete_and_restore_reach_the_remote() {
        let (service, remote) = service(true);
        let note = service
            .create_note(notebook(), GroupId::Staple, "Trash me", "", "")
            .await
            .unwrap();
        service.drain_now().await.unwrap();

        let deleted = service.soft_delete(&note.id).await.unwrap();
        assert!(deleted.is_deleted());
        assert!(remote.record(&deleted.id).unwrap().is_deleted());

        let restored = service.restore(&note.id).await.unwrap();
        assert!(!restored.is_deleted());
        assert!(!remote.record(&restored.id).unwrap().is_deleted());
        assert_eq!(service.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_delete_is_queued_for_retry() {
        let (service, remote) = service(true);
        let note = service
            .create_note(notebook(), GroupId::Staple, "Trash me", "", "")
            .await
            .unwrap();
        service.drain_now().await.unwrap();
        remote.fail_next(
            RemoteOp::UpdateRecord,
            RemoteError::NetworkUnavailable("flaky".into()),
        );

        let deleted = service.soft_delete(&note.id).await.unwrap();
        assert_eq!(service.pending_count().await.unwrap(), 1);

        service.drain_now().await.unwrap();
        assert!(remote.record(&deleted.id).unwrap().is_deleted());
    }

    #[tokio::test]
    async fn purge_requires_soft_delete() {
        let (service, _) = service(false);
        let note = service
            .create_note(notebook(), GroupId::Staple, "Scratch", "", "")
            .await
            .unwrap();

        assert!(matches!(
            service.purge(&note.id).await,
            Err(Error::InvalidInput(_))
        ));

        service.soft_delete(&note.id).await.unwrap();
        service.purge(&note.id).await.unwrap();
        assert!(service.get_note(&note.id).await.unwrap().is_none());
        assert_eq!(service.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_notes_hides_deleted() {
        let (service, _) = service(false);
        let keep = service
            .create_note(notebook(), GroupId::Staple, "Keep", "", "")
            .await
            .unwrap();
        let drop = service
            .create_note(notebook(), GroupId::Staple, "Drop", "", "")
            .await
            .unwrap();
        service.soft_delete(&drop.id).await.unwrap();

        let notes = service
            .list_notes(&NoteQuery::container(notebook()))
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, keep.id);
    }

    #[tokio::test(start_paused = true)]
    async fn started_service_drains_on_reconnect() {
        let (service, remote) = service(false);
        service
            .create_note(notebook(), GroupId::Staple, "Hello", "", "")
            .await
            .unwrap();
        service.start().await;

        service.set_online(true);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(remote.calls().create_record, 1);
        assert_eq!(service.pending_count().await.unwrap(), 0);
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn session_edits_flow_through_the_service() {
        let (service, remote) = service(true);
        let note = service
            .create_note(notebook(), GroupId::Staple, "Plan", "", "")
            .await
            .unwrap();
        service.drain_now().await.unwrap();

        let session = service.open_session(&note.id).await.unwrap();
        session.edit_content("<p>step one</p>", "step one").await.unwrap();
        session.close().await.unwrap();

        let durable = service.get_note(&note.id).await.unwrap().unwrap().id;
        assert_eq!(remote.record(&durable).unwrap().content, "<p>step one</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn open_session_does_not_undo_soft_delete() {
        let (service, remote) = service(true);
        let note = service
            .create_note(notebook(), GroupId::Staple, "Plan", "", "")
            .await
            .unwrap();
        service.drain_now().await.unwrap();
        let session = service.open_session(&note.id).await.unwrap();

        let deleted = service.soft_delete(&note.id).await.unwrap();
        session.edit_content("<p>typed late</p>", "typed late").await.unwrap();
        assert!(service.get_note(&deleted.id).await.unwrap().unwrap().is_deleted());

        session.flush().await.unwrap();
        let stored = service.get_note(&deleted.id).await.unwrap().unwrap();
        assert_eq!(stored.deleted_at, deleted.deleted_at);
        assert_eq!(stored.content, "<p>typed late</p>");
        assert_eq!(remote.record(&deleted.id).unwrap().deleted_at, deleted.deleted_at);
    }
}
