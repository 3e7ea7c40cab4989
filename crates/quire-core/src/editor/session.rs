//! Debounced saving for one note being edited.
//!
//! Every edit is written to the local store right away. The remote write is
//! debounced: each edit cancels the pending timer and schedules a new one, so
//! a burst of typing produces a single remote update carrying the last state.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::title::{derive_title, is_placeholder, unique_title, DEFAULT_TITLE};
use crate::db::SyncQueueEntry;
use crate::error::Result;
use crate::models::{Note, NotePatch, QueueTarget};
use crate::remote::RemoteStore;
use crate::services::LocalStore;
use crate::sync::{ConnectivityGate, DrainTrigger, SyncEvents};

/// Called with the note as written after a successful remote update.
pub type SyncedCallback = Arc<dyn Fn(&Note) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorSettings {
    /// Quiet period before an edit is written remotely
    pub debounce: Duration,
    /// Longest title derived from the note body
    pub title_max_chars: usize,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2500),
            title_max_chars: 50,
        }
    }
}

/// Collaborators shared by every session of a process.
#[derive(Clone)]
pub struct SessionContext {
    pub local: LocalStore,
    pub remote: Arc<dyn RemoteStore>,
    pub gate: ConnectivityGate,
    pub events: SyncEvents,
    pub trigger: DrainTrigger,
    pub settings: EditorSettings,
}

impl SessionContext {
    /// Write `patch` for `note` remotely, or queue it when that is not
    /// possible right now. Returns whether the remote write succeeded.
    ///
    /// Remote failures are queued and reported as events; only local
    /// persistence errors are returned.
    pub async fn push(&self, note: &Note, patch: &NotePatch) -> Result<bool> {
        let target = QueueTarget::Record(note.id.clone());
        if note.id.is_temporary() {
            self.queue(&target, patch).await?;
            self.trigger.request_drain();
            return Ok(false);
        }
        if !self.gate.is_online() {
            tracing::debug!("Offline; queued write for {}", note.id);
            self.queue(&target, patch).await?;
            return Ok(false);
        }
        if self.queue_if_pending(&target, patch).await? {
            // An older write is still queued; the queue now carries this one
            // and replays it in order.
            self.trigger.request_drain();
            return Ok(false);
        }

        self.events.syncing(&note.id);
        match self.remote.update_record(&note.id, patch).await {
            Ok(()) => {
                self.events.synced(Some(&note.id));
                Ok(true)
            }
            Err(error) => {
                tracing::warn!("Remote write for {} failed, queued: {error}", note.id);
                self.queue(&target, patch).await?;
                self.events.sync_error(&note.id, &error);
                Ok(false)
            }
        }
    }

    async fn queue(&self, target: &QueueTarget, patch: &NotePatch) -> Result<()> {
        let pending = self.local.get_entry(target).await?;
        self.local
            .enqueue(target, &carry_deletion(patch, pending.as_ref()))
            .await?;
        Ok(())
    }

    async fn queue_if_pending(&self, target: &QueueTarget, patch: &NotePatch) -> Result<bool> {
        let Some(pending) = self.local.get_entry(target).await? else {
            return Ok(false);
        };
        self.local
            .enqueue(target, &carry_deletion(patch, Some(&pending)))
            .await?;
        Ok(true)
    }
}

/// A replacement payload keeps a queued delete or restore it does not override.
fn carry_deletion(patch: &NotePatch, pending: Option<&SyncQueueEntry>) -> NotePatch {
    let mut patch = patch.clone();
    if patch.deletion.is_none() {
        patch.deletion = pending.and_then(|entry| entry.patch.deletion);
    }
    patch
}

struct SessionState {
    note: Note,
    /// Last title produced by auto-derivation
    derived_title: Option<String>,
    title_overridden: bool,
    /// Local edits not yet handed to the remote store or the queue
    dirty: bool,
}

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct SessionInner {
    ctx: SessionContext,
    state: Mutex<SessionState>,
    timer: StdMutex<TimerSlot>,
    on_synced: Option<SyncedCallback>,
}

/// One editing session; owns at most one pending flush timer.
pub struct EditSession {
    inner: Arc<SessionInner>,
}

impl EditSession {
    pub fn open(ctx: SessionContext, note: Note, on_synced: Option<SyncedCallback>) -> Self {
        let max_chars = ctx.settings.title_max_chars;
        let derived_title = (is_placeholder(&note.title)
            || note.title == derive_title(&note.plain_text, max_chars))
        .then(|| note.title.clone());
        tracing::debug!("Opened edit session for {}", note.id);
        Self {
            inner: Arc::new(SessionInner {
                ctx,
                state: Mutex::new(SessionState {
                    note,
                    derived_title,
                    title_overridden: false,
                    dirty: false,
                }),
                timer: StdMutex::new(TimerSlot::default()),
                on_synced,
            }),
        }
    }

    /// Snapshot of the note as currently edited.
    pub async fn note(&self) -> Note {
        self.inner.state.lock().await.note.clone()
    }

    /// Replace the note body; the title follows the first line until the
    /// user sets one explicitly.
    pub async fn edit_content(
        &self,
        content: impl Into<String>,
        plain_text: impl Into<String>,
    ) -> Result<()> {
        let max_chars = self.inner.ctx.settings.title_max_chars;
        {
            let mut state = self.inner.state.lock().await;
            state.note.content = content.into();
            state.note.plain_text = plain_text.into();

            let follows_body = !state.title_overridden
                && (state.derived_title.as_deref() == Some(state.note.title.as_str())
                    || is_placeholder(&state.note.title));
            if follows_body {
                let derived = derive_title(&state.note.plain_text, max_chars);
                if !derived.is_empty() {
                    state.note.title.clone_from(&derived);
                    state.derived_title = Some(derived);
                }
            }
            self.inner.save_locally(&mut state).await?;
        }
        self.inner.schedule();
        Ok(())
    }

    /// Set the title explicitly; stops auto-derivation for this session.
    pub async fn edit_title(&self, title: impl Into<String>) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            state.title_overridden = true;
            state.note.title = title.into();
            self.inner.save_locally(&mut state).await?;
        }
        self.inner.schedule();
        Ok(())
    }

    /// Cancel the pending timer and write now.
    pub async fn flush(&self) -> Result<()> {
        self.inner.cancel_timer();
        self.inner.write_remote().await
    }

    /// Cancel the pending timer and write in the background.
    ///
    /// For teardown paths that cannot wait for the remote store.
    pub fn flush_detached(&self) {
        self.inner.cancel_timer();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = inner.write_remote().await {
                tracing::error!("Detached flush failed: {e}");
            }
        });
    }

    /// End the session, writing any unsaved edit first.
    pub async fn close(self) -> Result<()> {
        self.flush().await
    }
}

impl SessionInner {
    async fn save_locally(&self, state: &mut SessionState) -> Result<()> {
        let local = &self.ctx.local;
        state.note.id = local.resolve_id(&state.note.id).await?;
        // Deletion state is owned by delete/restore, never by an edit.
        if let Some(stored) = local.get(&state.note.id).await? {
            state.note.deleted_at = stored.deleted_at;
        }
        state.note.updated_at = crate::util::now_millis();
        state.note.id = local.put(&state.note).await?;
        state.dirty = true;
        Ok(())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, TimerSlot> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_timer(&self) {
        let mut slot = self.slot();
        slot.generation += 1;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
    }

    fn schedule(self: &Arc<Self>) {
        let delay = self.ctx.settings.debounce;
        let mut slot = self.slot();
        slot.generation += 1;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }

        let generation = slot.generation;
        let inner = self.clone();
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                // Leave the slot before writing so a later cancel cannot
                // abort a write that has already started.
                let mut slot = inner.slot();
                if slot.generation != generation {
                    return;
                }
                slot.handle = None;
            }
            if let Err(e) = inner.write_remote().await {
                tracing::error!("Debounced save failed: {e}");
            }
        }));
    }

    async fn write_remote(&self) -> Result<()> {
        let local = &self.ctx.local;
        let (note, patch) = {
            let mut state = self.state.lock().await;
            if !state.dirty {
                return Ok(());
            }

            state.note.id = local.resolve_id(&state.note.id).await?;
            if let Some(stored) = local.get(&state.note.id).await? {
                state.note.deleted_at = stored.deleted_at;
            }
            if is_placeholder(&state.note.title) {
                let title = self.sibling_unique_title(&state.note).await?;
                tracing::debug!("Resolved placeholder title for {} to {title}", state.note.id);
                state.note.title = title;
                local.put(&state.note).await?;
            }

            state.dirty = false;
            (state.note.clone(), NotePatch::from_edit(&state.note))
        };

        if self.ctx.push(&note, &patch).await? {
            if let Some(callback) = &self.on_synced {
                callback(&note);
            }
        }
        Ok(())
    }

    async fn sibling_unique_title(&self, note: &Note) -> Result<String> {
        let siblings = self.ctx.local.get_all().await?;
        let titles = siblings
            .iter()
            .filter(|other| {
                other.id != note.id
                    && other.container_id == note.container_id
                    && !other.is_deleted()
            })
            .map(|other| other.title.as_str());
        let base = if note.title.trim().is_empty() {
            DEFAULT_TITLE
        } else {
            note.title.as_str()
        };
        Ok(unique_title(base, titles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::{ContainerId, GroupId};
    use crate::remote::{MemoryRemoteStore, RemoteError, RemoteOp};
    use crate::sync::{SyncEvent, SyncQueueProcessor};
    use pretty_assertions::assert_eq;

    const DEBOUNCE: Duration = Duration::from_millis(2500);

    struct Fixture {
        ctx: SessionContext,
        remote: Arc<MemoryRemoteStore>,
    }

    fn fixture(online: bool) -> Fixture {
        let remote = Arc::new(MemoryRemoteStore::new());
        let ctx = SessionContext {
            local: LocalStore::open_in_memory().unwrap(),
            remote: remote.clone(),
            gate: ConnectivityGate::new(online),
            events: SyncEvents::new(),
            trigger: DrainTrigger::new(),
            settings: EditorSettings::default(),
        };
        Fixture { ctx, remote }
    }

    fn local_note(title: &str) -> Note {
        Note::new_local(ContainerId::new("nb-1"), GroupId::Staple).with_title(title)
    }

    /// A note that already exists on both sides
    async fn durable_note(fixture: &Fixture, title: &str) -> Note {
        let draft = local_note(title).draft(&GroupId::Staple);
        let id = fixture.remote.create_record(&draft).await.unwrap();
        let note = draft.into_note(id);
        fixture.ctx.local.put(&note).await.unwrap();
        note
    }

    fn updates(fixture: &Fixture) -> usize {
        fixture.remote.calls().update_record
    }

    #[tokio::test(start_paused = true)]
    async fn local_write_is_immediate() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        session.edit_content("<p>draft</p>", "draft").await.unwrap();

        let stored = fixture.ctx.local.get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "<p>draft</p>");
        assert_eq!(updates(&fixture), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_remote_write() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        for i in 0..5 {
            session
                .edit_content(format!("<p>v{i}</p>"), format!("v{i}"))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(updates(&fixture), 0);

        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(updates(&fixture), 1);
        assert_eq!(fixture.remote.record(&note.id).unwrap().content, "<p>v4</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn forced_flush_cancels_pending_timer() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.edit_content("<p>x</p>", "x").await.unwrap();
        session.flush().await.unwrap();
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(updates(&fixture), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_without_edits_writes_nothing() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.close().await.unwrap();
        assert_eq!(updates(&fixture), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn title_follows_first_line_until_user_sets_it() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "").await;
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.edit_content("", "Shopping list\nmilk").await.unwrap();
        assert_eq!(session.note().await.title, "Shopping list");

        session.edit_content("", "Shopping\nmilk").await.unwrap();
        assert_eq!(session.note().await.title, "Shopping");

        session.edit_title("Errands").await.unwrap();
        session.edit_content("", "Something else").await.unwrap();
        assert_eq!(session.note().await.title, "Errands");
    }

    #[tokio::test(start_paused = true)]
    async fn user_named_note_keeps_its_title() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Recipes").await;
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.edit_content("", "Pancakes").await.unwrap();
        assert_eq!(session.note().await.title, "Recipes");
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_title_is_made_unique_before_writing() {
        let fixture = fixture(true);
        durable_note(&fixture, "New Note").await;
        durable_note(&fixture, "New Note").await;
        let note = durable_note(&fixture, "New Note").await;
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        session.edit_content("<p></p>", "").await.unwrap();
        session.flush().await.unwrap();

        assert_eq!(fixture.remote.record(&note.id).unwrap().title, "Note1");
        let stored = fixture.ctx.local.get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Note1");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_queued_and_reported() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        fixture.remote.fail_next(
            RemoteOp::UpdateRecord,
            RemoteError::NetworkUnavailable("dropped".into()),
        );
        let mut events = fixture.ctx.events.subscribe();
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        session.edit_content("<p>kept</p>", "kept").await.unwrap();
        session.flush().await.unwrap();

        let entry = fixture
            .ctx
            .local
            .get_entry(&QueueTarget::Record(note.id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.patch.content.as_deref(), Some("<p>kept</p>"));
        assert_eq!(
            events.try_recv().unwrap(),
            SyncEvent::Syncing {
                record_id: note.id.clone()
            }
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            SyncEvent::SyncError { record_id, .. } if record_id == note.id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_write_runs_completion_callback() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let callback: SyncedCallback = Arc::new(move |_note: &Note| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let session = EditSession::open(fixture.ctx.clone(), note, Some(callback));

        session.edit_title("Renamed").await.unwrap();
        session.flush().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_edit_is_queued_without_remote_call() {
        let fixture = fixture(false);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.edit_content("<p>x</p>", "x").await.unwrap();
        session.flush().await.unwrap();

        assert_eq!(updates(&fixture), 0);
        assert_eq!(fixture.ctx.local.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn temporary_note_is_handed_to_the_queue() {
        let fixture = fixture(true);
        let note = local_note("Draft");
        fixture.ctx.local.put(&note).await.unwrap();
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        session.edit_content("<p>offline</p>", "offline").await.unwrap();
        session.flush().await.unwrap();

        assert_eq!(fixture.remote.calls(), Default::default());
        let entry = fixture
            .ctx
            .local
            .get_entry(&QueueTarget::Record(note.id))
            .await
            .unwrap();
        assert!(entry.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn edits_after_promotion_target_the_durable_id() {
        let fixture = fixture(true);
        let note = local_note("Draft");
        fixture.ctx.local.put(&note).await.unwrap();
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);
        session.edit_content("<p>one</p>", "one").await.unwrap();
        session.flush().await.unwrap();

        let processor = SyncQueueProcessor::new(
            fixture.ctx.local.clone(),
            fixture.remote.clone(),
            fixture.ctx.gate.clone(),
            fixture.ctx.events.clone(),
        );
        processor.drain().await.unwrap();

        session.edit_content("<p>two</p>", "two").await.unwrap();
        session.flush().await.unwrap();

        let durable = session.note().await.id;
        assert!(!durable.is_temporary());
        assert!(fixture.ctx.local.get(&note.id).await.unwrap().is_none());
        assert_eq!(fixture.remote.record(&durable).unwrap().content, "<p>two</p>");
        assert_eq!(fixture.ctx.local.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_flush_completes_in_background() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        session.edit_content("<p>bye</p>", "bye").await.unwrap();
        session.flush_detached();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(updates(&fixture), 1);
        assert_eq!(fixture.remote.record(&note.id).unwrap().content, "<p>bye</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn offline_edit_keeps_queued_restore() {
        let fixture = fixture(false);
        let note = durable_note(&fixture, "Plan").await;
        let target = QueueTarget::Record(note.id.clone());
        fixture
            .ctx
            .local
            .enqueue(&target, &NotePatch::restore(1))
            .await
            .unwrap();
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.edit_content("<p>back</p>", "back").await.unwrap();
        session.flush().await.unwrap();

        let entry = fixture.ctx.local.get_entry(&target).await.unwrap().unwrap();
        assert_eq!(entry.patch.deletion, Some(crate::models::Deletion::Restore));
        assert_eq!(entry.patch.content.as_deref(), Some("<p>back</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn edit_keeps_deletion_made_while_session_was_open() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Plan").await;
        let session = EditSession::open(fixture.ctx.clone(), note.clone(), None);

        let mut deleted = note.clone();
        deleted.deleted_at = Some(42);
        fixture.ctx.local.put(&deleted).await.unwrap();

        session.edit_content("<p>late</p>", "late").await.unwrap();
        let stored = fixture.ctx.local.get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.deleted_at, Some(42));
        assert_eq!(stored.content, "<p>late</p>");

        session.flush().await.unwrap();
        let stored = fixture.ctx.local.get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.deleted_at, Some(42));
        assert_eq!(fixture.remote.record(&note.id).unwrap().deleted_at, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn derived_title_keeps_following_body_in_new_session() {
        let fixture = fixture(true);
        let note = durable_note(&fixture, "Shopping list").await;
        let mut note = note;
        note.plain_text = "Shopping list\nmilk".to_string();
        fixture.ctx.local.put(&note).await.unwrap();
        let session = EditSession::open(fixture.ctx.clone(), note, None);

        session.edit_content("", "Groceries\nmilk").await.unwrap();
        assert_eq!(session.note().await.title, "Groceries");
    }
}
