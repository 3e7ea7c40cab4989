//! Atomic rewrite of a temporary identity to a durable one

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{GroupId, IdKind, RecordId};
use crate::util::now_millis;

/// The record half of a promotion
#[derive(Debug, Clone)]
pub struct RecordPromotion<'a> {
    pub temporary: &'a str,
    pub durable: &'a str,
    /// Revision of the queue entry the drain read before creating the record
    pub processed_revision: i64,
}

/// The group half of a promotion, when the owning group was temporary too
#[derive(Debug, Clone)]
pub struct GroupPromotion<'a> {
    pub temporary: &'a str,
    pub durable: &'a str,
}

/// What happened to the temporary-keyed queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The entry was the one the drain processed and is gone
    Completed,
    /// A newer edit arrived during creation; it now waits under the durable ID
    MigratedNewerEdit,
}

/// Rewrite a promoted record, its group and its queue entry in one transaction
///
/// Either every table reflects the durable identity or none does.
pub fn promote(
    conn: &Connection,
    record: &RecordPromotion<'_>,
    group: Option<&GroupPromotion<'_>>,
) -> Result<PromotionOutcome> {
    let tx = conn.unchecked_transaction()?;
    let now = now_millis();

    if let Some(group) = group {
        tx.execute(
            "DELETE FROM note_groups WHERE id = ?1 AND id <> ?2",
            params![group.durable, group.temporary],
        )?;
        tx.execute(
            "UPDATE note_groups SET id = ?1, id_kind = ?2 WHERE id = ?3",
            params![group.durable, IdKind::Durable.as_str(), group.temporary],
        )?;
        tx.execute(
            "UPDATE records SET group_id = ?1, group_kind = ?2 WHERE group_id = ?3",
            params![group.durable, IdKind::Durable.as_str(), group.temporary],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO promoted_ids (temporary_id, durable_id, entity, promoted_at)
             VALUES (?1, ?2, 'group', ?3)",
            params![group.temporary, group.durable, now],
        )?;
    }

    // The local row is the only authoritative copy until now; a cached
    // remote copy under the durable ID must not shadow it.
    tx.execute(
        "DELETE FROM records WHERE id = ?1 AND id <> ?2",
        params![record.durable, record.temporary],
    )?;
    tx.execute(
        "UPDATE records SET id = ?1, id_kind = ?2 WHERE id = ?3",
        params![record.durable, IdKind::Durable.as_str(), record.temporary],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO promoted_ids (temporary_id, durable_id, entity, promoted_at)
         VALUES (?1, ?2, 'record', ?3)",
        params![record.temporary, record.durable, now],
    )?;

    let current_revision: Option<i64> = tx
        .query_row(
            "SELECT revision FROM sync_queue WHERE target_id = ?",
            params![record.temporary],
            |row| row.get(0),
        )
        .optional()?;

    let outcome = match current_revision {
        Some(revision) if revision > record.processed_revision => {
            tx.execute(
                "DELETE FROM sync_queue WHERE target_id = ?",
                params![record.durable],
            )?;
            tx.execute(
                "UPDATE sync_queue SET target_id = ?1, target_kind = ?2 WHERE target_id = ?3",
                params![record.durable, IdKind::Durable.as_str(), record.temporary],
            )?;
            PromotionOutcome::MigratedNewerEdit
        }
        _ => {
            tx.execute(
                "DELETE FROM sync_queue WHERE target_id = ?",
                params![record.temporary],
            )?;
            PromotionOutcome::Completed
        }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Convenience for building the group half from a note's group
pub fn group_promotion<'a>(from: &'a GroupId, to: &'a GroupId) -> Option<GroupPromotion<'a>> {
    match (from, to) {
        (GroupId::Temporary(temporary), GroupId::Durable(durable)) => Some(GroupPromotion {
            temporary,
            durable,
        }),
        _ => None,
    }
}

/// Convenience for building the record half from a pair of IDs
pub fn record_promotion<'a>(
    from: &'a RecordId,
    to: &'a RecordId,
    processed_revision: i64,
) -> Option<RecordPromotion<'a>> {
    match (from, to) {
        (RecordId::Temporary(temporary), RecordId::Durable(durable)) => Some(RecordPromotion {
            temporary,
            durable,
            processed_revision,
        }),
        _ => None,
    }
}
