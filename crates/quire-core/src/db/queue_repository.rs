//! Sync queue store

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{IdKind, NotePatch, QueueTarget, RecordId};
use crate::util::now_millis;

/// A pending mutation waiting for the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQueueEntry {
    /// Current key of the record the payload targets
    pub target: QueueTarget,
    /// Fields to write
    pub patch: NotePatch,
    /// Time of the most recent enqueue for this key (Unix ms)
    pub enqueued_at: i64,
    /// Bumped on every overwrite of this key
    pub revision: i64,
}

/// Trait for pending-mutation storage
pub trait SyncQueueRepository {
    /// Store `patch` for `target`, replacing any payload already queued for it
    fn enqueue(&self, target: &QueueTarget, patch: &NotePatch) -> Result<QueueTarget>;

    /// Every pending entry, in storage order
    fn list_pending(&self) -> Result<Vec<SyncQueueEntry>>;

    /// The entry currently queued for `target`
    fn get_entry(&self, target: &QueueTarget) -> Result<Option<SyncQueueEntry>>;

    /// Remove the entry for `target`
    fn dequeue(&self, target: &QueueTarget) -> Result<bool>;

    /// Remove the entry for `target` only if it was not overwritten since
    /// `revision` was read
    fn dequeue_processed(&self, target: &QueueTarget, revision: i64) -> Result<bool>;

    /// Number of pending entries
    fn pending_count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `SyncQueueRepository`
pub struct SqliteSyncQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Redirect keys of already-promoted temporary records to their durable ID
    fn resolve_target(&self, target: &QueueTarget) -> Result<QueueTarget> {
        let QueueTarget::Record(RecordId::Temporary(temporary)) = target else {
            return Ok(target.clone());
        };

        let durable: Option<String> = self
            .conn
            .query_row(
                "SELECT durable_id FROM promoted_ids WHERE temporary_id = ?",
                params![temporary],
                |row| row.get(0),
            )
            .optional()?;

        Ok(durable.map_or_else(
            || target.clone(),
            |id| QueueTarget::Record(RecordId::Durable(id)),
        ))
    }

    fn parse_entry(row: &Row<'_>) -> rusqlite::Result<SyncQueueEntry> {
        let kind: String = row.get(1)?;
        let payload: String = row.get(2)?;

        let kind = kind.parse::<IdKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let target = QueueTarget::from_parts(kind, row.get(0)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let patch = serde_json::from_str(&payload).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(SyncQueueEntry {
            target,
            patch,
            enqueued_at: row.get(3)?,
            revision: row.get(4)?,
        })
    }
}

impl SyncQueueRepository for SqliteSyncQueueRepository<'_> {
    fn enqueue(&self, target: &QueueTarget, patch: &NotePatch) -> Result<QueueTarget> {
        let target = self.resolve_target(target)?;
        let payload = serde_json::to_string(patch)?;

        self.conn.execute(
            "INSERT INTO sync_queue (target_id, target_kind, payload, enqueued_at, revision)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT(target_id) DO UPDATE SET
                target_kind = excluded.target_kind,
                payload = excluded.payload,
                enqueued_at = excluded.enqueued_at,
                revision = sync_queue.revision + 1",
            params![
                target.key(),
                target.kind().as_str(),
                payload,
                now_millis()
            ],
        )?;

        tracing::debug!("Queued pending write for {target}");
        Ok(target)
    }

    fn list_pending(&self) -> Result<Vec<SyncQueueEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_id, target_kind, payload, enqueued_at, revision FROM sync_queue",
        )?;

        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn get_entry(&self, target: &QueueTarget) -> Result<Option<SyncQueueEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT target_id, target_kind, payload, enqueued_at, revision
                 FROM sync_queue WHERE target_id = ?",
                params![target.key()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn dequeue(&self, target: &QueueTarget) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE target_id = ?",
            params![target.key()],
        )?;
        Ok(rows > 0)
    }

    fn dequeue_processed(&self, target: &QueueTarget, revision: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE target_id = ? AND revision = ?",
            params![target.key(), revision],
        )?;
        Ok(rows > 0)
    }

    fn pending_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn titled(title: &str) -> NotePatch {
        NotePatch {
            title: Some(title.to_string()),
            ..NotePatch::default()
        }
    }

    #[test]
    fn test_enqueue_overwrites_same_record() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        let target = QueueTarget::Record(RecordId::durable("n-1"));

        repo.enqueue(&target, &titled("first")).unwrap();
        repo.enqueue(&target, &titled("second")).unwrap();

        let pending = repo.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].patch, titled("second"));
        assert_eq!(pending[0].revision, 2);
        assert_eq!(repo.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_entries_for_different_records_are_independent() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        let first = QueueTarget::Record(RecordId::durable("n-1"));
        let second = QueueTarget::Record(RecordId::mint_temporary());

        repo.enqueue(&first, &titled("a")).unwrap();
        repo.enqueue(&second, &titled("b")).unwrap();
        assert_eq!(repo.pending_count().unwrap(), 2);

        assert!(repo.dequeue(&first).unwrap());
        assert!(!repo.dequeue(&first).unwrap());

        let remaining = repo.list_pending().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].target, second);
    }

    #[test]
    fn test_dequeue_processed_keeps_newer_payload() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        let target = QueueTarget::Record(RecordId::durable("n-1"));

        repo.enqueue(&target, &titled("read by drain")).unwrap();
        let processed = repo.get_entry(&target).unwrap().unwrap();
        repo.enqueue(&target, &titled("typed meanwhile")).unwrap();

        assert!(!repo
            .dequeue_processed(&target, processed.revision)
            .unwrap());
        assert_eq!(
            repo.get_entry(&target).unwrap().unwrap().patch,
            titled("typed meanwhile")
        );

        let current = repo.get_entry(&target).unwrap().unwrap();
        assert!(repo.dequeue_processed(&target, current.revision).unwrap());
        assert_eq!(repo.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_diagnostic_entries_keep_their_kind() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        let heartbeat = QueueTarget::diagnostic("heartbeat");

        repo.enqueue(&heartbeat, &NotePatch::default()).unwrap();

        let entry = repo.get_entry(&heartbeat).unwrap().unwrap();
        assert_eq!(entry.target, heartbeat);
        assert!(entry.target.record_id().is_none());
    }

    #[test]
    fn test_enqueue_follows_promoted_alias() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        let temporary = RecordId::mint_temporary();
        db.connection()
            .execute(
                "INSERT INTO promoted_ids (temporary_id, durable_id, entity, promoted_at)
                 VALUES (?, 'n-9', 'record', 0)",
                params![temporary.as_str()],
            )
            .unwrap();

        let written = repo
            .enqueue(&QueueTarget::Record(temporary), &titled("late"))
            .unwrap();

        assert_eq!(written, QueueTarget::Record(RecordId::durable("n-9")));
        assert_eq!(repo.list_pending().unwrap()[0].target, written);
    }
}
