//! Drains the sync queue against the remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::reconciler::{IdentityReconciler, ReconcileError};
use super::{ConnectivityGate, SyncEvent, SyncEvents};
use crate::db::SyncQueueEntry;
use crate::error::Result;
use crate::models::{QueueTarget, RecordId};
use crate::remote::RemoteStore;
use crate::services::LocalStore;

/// Outcome counts of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Durable records updated remotely.
    pub synced: usize,
    /// Temporary records created remotely and promoted.
    pub promoted: usize,
    /// Entries dropped because their record is gone for good.
    pub dropped: usize,
    /// Entries left queued after a retryable failure.
    pub failed: usize,
    /// Diagnostic entries removed without a remote call.
    pub skipped: usize,
    /// Entries not attempted because connectivity dropped mid-drain.
    pub deferred: usize,
}

impl DrainReport {
    /// Number of entries that left the queue.
    pub const fn completed(&self) -> usize {
        self.synced + self.promoted + self.dropped + self.skipped
    }
}

/// Clears the draining flag however the drain ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum EntryOutcome {
    Synced,
    Promoted,
    Dropped,
    Failed,
    Skipped,
}

/// The engine that replays queued mutations once connectivity returns.
pub struct SyncQueueProcessor {
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
    gate: ConnectivityGate,
    events: SyncEvents,
    reconciler: IdentityReconciler,
    draining: AtomicBool,
}

impl SyncQueueProcessor {
    pub fn new(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        gate: ConnectivityGate,
        events: SyncEvents,
    ) -> Self {
        let reconciler = IdentityReconciler::new(local.clone(), remote.clone());
        Self {
            local,
            remote,
            gate,
            events,
            reconciler,
            draining: AtomicBool::new(false),
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Run one drain cycle over every queued entry.
    ///
    /// Returns `None` without touching the queue when offline or when another
    /// drain is already running. Remote failures never surface here; only
    /// local persistence errors do.
    pub async fn drain(&self) -> Result<Option<DrainReport>> {
        if !self.gate.is_online() {
            tracing::debug!("Drain skipped: offline");
            return Ok(None);
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Drain skipped: already draining");
            return Ok(None);
        }
        let _guard = DrainGuard(&self.draining);

        let mut entries = self.local.list_pending().await?;
        entries.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.target.key().cmp(b.target.key()))
        });

        let mut report = DrainReport::default();
        if entries.is_empty() {
            return Ok(Some(report));
        }
        tracing::info!("Draining {} pending write(s)", entries.len());

        let total = entries.len();
        for (index, entry) in entries.iter().enumerate() {
            if !self.gate.is_online() {
                report.deferred = total - index;
                tracing::info!("Went offline mid-drain; deferring {}", report.deferred);
                break;
            }

            match self.process_entry(entry).await? {
                EntryOutcome::Synced => report.synced += 1,
                EntryOutcome::Promoted => report.promoted += 1,
                EntryOutcome::Dropped => report.dropped += 1,
                EntryOutcome::Failed => report.failed += 1,
                EntryOutcome::Skipped => report.skipped += 1,
            }
        }

        tracing::info!(
            synced = report.synced,
            promoted = report.promoted,
            dropped = report.dropped,
            failed = report.failed,
            deferred = report.deferred,
            "Drain finished"
        );
        Ok(Some(report))
    }

    async fn process_entry(&self, entry: &SyncQueueEntry) -> Result<EntryOutcome> {
        match &entry.target {
            QueueTarget::Diagnostic(key) => {
                tracing::debug!("Skipping diagnostic queue entry {key}");
                self.local.dequeue(&entry.target).await?;
                Ok(EntryOutcome::Skipped)
            }
            QueueTarget::Record(id @ RecordId::Temporary(_)) => {
                self.events.syncing(id);
                self.promote_entry(entry).await
            }
            QueueTarget::Record(id @ RecordId::Durable(_)) => self.update_entry(id, entry).await,
        }
    }

    async fn promote_entry(&self, entry: &SyncQueueEntry) -> Result<EntryOutcome> {
        match self.reconciler.promote(entry).await {
            Ok(promotion) => {
                self.events.emit(SyncEvent::Promoted {
                    temporary: promotion.temporary.clone(),
                    durable: promotion.durable.clone(),
                });
                self.events.synced(Some(&promotion.durable));
                Ok(EntryOutcome::Promoted)
            }
            Err(ReconcileError::Remote(error)) => {
                tracing::warn!("Promotion of {} failed, will retry: {error}", entry.target);
                if let Some(id) = entry.target.record_id() {
                    self.events.sync_error(id, &error);
                }
                Ok(EntryOutcome::Failed)
            }
            Err(ReconcileError::RecordMissing(id)) => {
                tracing::warn!("Dropping queued create for {id}: local record is gone");
                self.local.dequeue(&entry.target).await?;
                self.events.synced(None);
                Ok(EntryOutcome::Dropped)
            }
            Err(ReconcileError::NotTemporary(key)) => Err(crate::Error::InvalidInput(format!(
                "queue entry {key} routed to promotion"
            ))),
            Err(ReconcileError::Local(error)) => Err(error),
        }
    }

    async fn update_entry(&self, id: &RecordId, entry: &SyncQueueEntry) -> Result<EntryOutcome> {
        self.events.syncing(id);
        match self.remote.update_record(id, &entry.patch).await {
            Ok(()) => {
                if !self
                    .local
                    .dequeue_processed(&entry.target, entry.revision)
                    .await?
                {
                    tracing::debug!("{id} was edited during sync; keeping newer payload");
                }
                self.events.synced(Some(id));
                Ok(EntryOutcome::Synced)
            }
            Err(error) if error.is_not_found() => {
                tracing::warn!("Dropping queued write for {id}: {error}");
                self.local.dequeue(&entry.target).await?;
                self.events.synced(Some(id));
                Ok(EntryOutcome::Dropped)
            }
            Err(error) => {
                tracing::warn!("Write for {id} failed, will retry: {error}");
                self.events.sync_error(id, &error);
                Ok(EntryOutcome::Failed)
            }
        }
    }
}
