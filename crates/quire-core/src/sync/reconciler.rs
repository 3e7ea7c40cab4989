//! Promotion of records created offline to durable identities.

use std::sync::Arc;

use thiserror::Error;

use crate::db::{PromotionOutcome, SyncQueueEntry};
use crate::models::{GroupDraft, GroupId, Note, RecordId};
use crate::remote::{RemoteError, RemoteStore};
use crate::services::LocalStore;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The remote store refused or could not be reached; retry later.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The local copy is gone, so there is nothing left to create.
    #[error("Local record {0} no longer exists")]
    RecordMissing(RecordId),
    /// The entry does not target a temporary record.
    #[error("{0} is not a temporary record id")]
    NotTemporary(String),
    #[error(transparent)]
    Local(#[from] crate::Error),
}

/// A completed promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub temporary: RecordId,
    pub durable: RecordId,
    /// Set when the owning group was promoted as part of this record.
    pub group: Option<(GroupId, GroupId)>,
    pub outcome: PromotionOutcome,
}

/// Creates offline records remotely and rewrites their local identity.
#[derive(Clone)]
pub struct IdentityReconciler {
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
}

impl IdentityReconciler {
    pub fn new(local: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Promote the temporary record targeted by `entry`.
    ///
    /// Nothing is written locally unless both the group and the record were
    /// created remotely; on failure the entry stays queued under its
    /// temporary key.
    pub async fn promote(&self, entry: &SyncQueueEntry) -> Result<Promotion, ReconcileError> {
        let temporary = match entry.target.record_id() {
            Some(id @ RecordId::Temporary(_)) => id.clone(),
            _ => return Err(ReconcileError::NotTemporary(entry.target.to_string())),
        };

        let note = self
            .local
            .get(&temporary)
            .await?
            .ok_or_else(|| ReconcileError::RecordMissing(temporary.clone()))?;

        let group_id = match &note.group_id {
            GroupId::Temporary(_) => {
                let draft = self.group_draft(&note).await?;
                let durable = self.remote.create_group(&draft).await?;
                tracing::debug!("Created remote group {durable} for {}", note.group_id);
                durable
            }
            other => other.clone(),
        };

        let durable = self.remote.create_record(&note.draft(&group_id)).await?;
        tracing::debug!("Created remote record {durable} for {temporary}");

        let group = (group_id != note.group_id).then(|| (note.group_id.clone(), group_id));
        let outcome = self
            .local
            .promote(
                &temporary,
                &durable,
                entry.revision,
                group.as_ref().map(|(from, to)| (from, to)),
            )
            .await?;

        tracing::info!("Promoted {temporary} to {durable}");
        Ok(Promotion {
            temporary,
            durable,
            group,
            outcome,
        })
    }

    /// Create payload for the note's group; ordinary groups are tied to a
    /// single note, so a lost group row is rebuilt from that note.
    async fn group_draft(&self, note: &Note) -> crate::Result<GroupDraft> {
        if let Some(group) = self.local.get_group(&note.group_id).await? {
            return Ok(group.draft());
        }

        tracing::warn!(
            "Group {} missing locally; creating it from its note",
            note.group_id
        );
        Ok(GroupDraft {
            container_id: note.container_id.clone(),
            name: note.title.clone(),
            is_staple: false,
            position: 0,
            created_at: note.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerId, Group, NotePatch, QueueTarget};
    use crate::remote::{MemoryRemoteStore, RemoteOp};
    use pretty_assertions::assert_eq;

    struct Fixture {
        local: LocalStore,
        remote: Arc<MemoryRemoteStore>,
        reconciler: IdentityReconciler,
    }

    fn fixture() -> Fixture {
        let local = LocalStore::open_in_memory().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let reconciler = IdentityReconciler::new(local.clone(), remote.clone());
        Fixture {
            local,
            remote,
            reconciler,
        }
    }

    async fn queue_offline_note(local: &LocalStore, note: &Note) -> SyncQueueEntry {
        local.put(note).await.unwrap();
        let target = QueueTarget::Record(note.id.clone());
        local
            .enqueue(&target, &NotePatch::from_edit(note))
            .await
            .unwrap();
        local.get_entry(&target).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn promotes_record_and_temporary_group() {
        let Fixture {
            local,
            remote,
            reconciler,
        } = fixture();
        let container = ContainerId::new("nb-1");
        let group = Group::new_local(container.clone(), "Ideas", 1);
        local.put_group(&group).await.unwrap();
        let note = Note::new_local(container, group.id.clone())
            .with_title("Hello")
            .with_body("{}", "Hello");
        let entry = queue_offline_note(&local, &note).await;

        let promotion = reconciler.promote(&entry).await.unwrap();

        assert!(!promotion.durable.is_temporary());
        assert_eq!(promotion.outcome, PromotionOutcome::Completed);
        let (_, durable_group) = promotion.group.clone().unwrap();
        assert_eq!(remote.group(&durable_group).unwrap().name, "Ideas");

        let stored = local.get(&promotion.durable).await.unwrap().unwrap();
        assert_eq!(stored.group_id, durable_group);
        assert_eq!(stored.title, "Hello");
        assert!(local.get(&note.id).await.unwrap().is_none());
        assert_eq!(local.pending_count().await.unwrap(), 0);
        assert_eq!(
            remote.record(&promotion.durable).unwrap().group_id,
            durable_group
        );
    }

    #[tokio::test]
    async fn staple_group_is_never_created_remotely() {
        let Fixture {
            local,
            remote,
            reconciler,
        } = fixture();
        let note = Note::new_local(ContainerId::new("nb-1"), GroupId::Staple).with_title("Pad");
        let entry = queue_offline_note(&local, &note).await;

        let promotion = reconciler.promote(&entry).await.unwrap();

        assert!(promotion.group.is_none());
        assert_eq!(remote.calls().create_group, 0);
    }

    #[tokio::test]
    async fn failed_record_create_commits_nothing() {
        let Fixture {
            local,
            remote,
            reconciler,
        } = fixture();
        let container = ContainerId::new("nb-1");
        let group = Group::new_local(container.clone(), "Ideas", 1);
        local.put_group(&group).await.unwrap();
        let note = Note::new_local(container, group.id.clone()).with_title("Hello");
        let entry = queue_offline_note(&local, &note).await;

        remote.fail_next(
            RemoteOp::CreateRecord,
            RemoteError::NetworkUnavailable("dropped".into()),
        );

        let error = reconciler.promote(&entry).await.unwrap_err();
        assert!(matches!(error, ReconcileError::Remote(_)));
        assert_eq!(remote.calls().create_group, 1);

        let stored = local.get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.group_id, group.id);
        assert!(local.get_group(&group.id).await.unwrap().is_some());
        assert_eq!(local.get_entry(&entry.target).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn missing_local_record_is_reported() {
        let Fixture {
            local, reconciler, ..
        } = fixture();
        let note = Note::new_local(ContainerId::new("nb-1"), GroupId::Staple);
        let entry = queue_offline_note(&local, &note).await;
        local.delete(&note.id).await.unwrap();

        let error = reconciler.promote(&entry).await.unwrap_err();
        assert!(matches!(error, ReconcileError::RecordMissing(id) if id == note.id));
    }
}
