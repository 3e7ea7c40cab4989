//! Shared local store service used by the sync core.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    self, Database, PromotionOutcome, RecordRepository, SqliteRecordRepository,
    SqliteSyncQueueRepository, SyncQueueEntry, SyncQueueRepository,
};
use crate::error::Result;
use crate::models::{ContainerId, Group, GroupId, Note, NotePatch, QueueTarget, RecordId};

/// Thread-safe handle over the record cache and the sync queue.
///
/// Persistence errors are returned to the caller untouched.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open a local store at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory local store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Upsert a note; returns the ID it was stored under.
    pub async fn put(&self, note: &Note) -> Result<RecordId> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).put(note)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Option<Note>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).get(id)
    }

    /// Every cached note regardless of notebook or deletion state.
    pub async fn get_all(&self) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).get_all()
    }

    /// Remove a note permanently.
    pub async fn delete(&self, id: &RecordId) -> Result<bool> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).delete(id)
    }

    pub async fn resolve_id(&self, id: &RecordId) -> Result<RecordId> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).resolve_id(id)
    }

    pub async fn put_group(&self, group: &Group) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).put_group(group)
    }

    pub async fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).get_group(id)
    }

    pub async fn list_groups(&self, container_id: &ContainerId) -> Result<Vec<Group>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).list_groups(container_id)
    }

    pub async fn delete_group(&self, id: &GroupId) -> Result<bool> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).delete_group(id)
    }

    /// Queue `patch` for `target`, replacing whatever was pending for it.
    pub async fn enqueue(&self, target: &QueueTarget, patch: &NotePatch) -> Result<QueueTarget> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).enqueue(target, patch)
    }

    pub async fn list_pending(&self) -> Result<Vec<SyncQueueEntry>> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).list_pending()
    }

    pub async fn get_entry(&self, target: &QueueTarget) -> Result<Option<SyncQueueEntry>> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).get_entry(target)
    }

    pub async fn dequeue(&self, target: &QueueTarget) -> Result<bool> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).dequeue(target)
    }

    /// Remove an entry unless it was overwritten after `revision` was read.
    pub async fn dequeue_processed(&self, target: &QueueTarget, revision: i64) -> Result<bool> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).dequeue_processed(target, revision)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).pending_count()
    }

    /// Commit a full promotion of `temporary` (and its group) in one transaction.
    pub async fn promote(
        &self,
        temporary: &RecordId,
        durable: &RecordId,
        processed_revision: i64,
        group: Option<(&GroupId, &GroupId)>,
    ) -> Result<PromotionOutcome> {
        let record = db::record_promotion(temporary, durable, processed_revision).ok_or_else(
            || {
                crate::Error::InvalidInput(format!(
                    "cannot promote {temporary} to {durable}: not a temporary to durable pair"
                ))
            },
        )?;
        let group = group.and_then(|(from, to)| db::group_promotion(from, to));

        let db = self.db.lock().await;
        db::promote(db.connection(), &record, group.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn in_memory_put_and_get_roundtrip() {
        let store = LocalStore::open_in_memory().unwrap();
        let note = Note::new_local(ContainerId::new("nb"), GroupId::Staple).with_title("core");

        store.put(&note).await.unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "core");
    }

    #[tokio::test]
    async fn queue_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("quire.db");
        let target = QueueTarget::Record(RecordId::durable("n-1"));

        {
            let store = LocalStore::open_path(&path).unwrap();
            store.enqueue(&target, &NotePatch::default()).await.unwrap();
        }

        let store = LocalStore::open_path(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert!(store.get_entry(&target).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn promote_rejects_durable_source() {
        let store = LocalStore::open_in_memory().unwrap();
        let durable = RecordId::durable("n-1");
        let result = store.promote(&durable, &durable, 0, None).await;
        assert!(result.is_err());
    }
}
