//! Local record store

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{ContainerId, Group, GroupId, IdKind, Note, RecordId};
use crate::util::now_millis;

const NOTE_COLUMNS: &str = "id, id_kind, container_id, group_id, group_kind, owner_id, title, \
     content, plain_text, created_at, updated_at, deleted_at";

/// Trait for the on-device record cache
///
/// Pure storage: no filtering by owner or deletion state happens here.
pub trait RecordRepository {
    /// Upsert a note by ID, stamping a fresh local modification time
    ///
    /// Returns the ID the row was written under, which differs from
    /// `note.id` when that temporary ID has already been promoted.
    fn put(&self, note: &Note) -> Result<RecordId>;

    /// Get a note by ID
    fn get(&self, id: &RecordId) -> Result<Option<Note>>;

    /// Every cached note, most recently modified on this device first
    fn get_all(&self) -> Result<Vec<Note>>;

    /// Remove a note permanently
    fn delete(&self, id: &RecordId) -> Result<bool>;

    /// Follow a promoted temporary ID to its durable replacement
    fn resolve_id(&self, id: &RecordId) -> Result<RecordId>;

    /// Upsert a group by ID
    fn put_group(&self, group: &Group) -> Result<()>;

    /// Get a group by ID, following a promoted temporary ID
    fn get_group(&self, id: &GroupId) -> Result<Option<Group>>;

    /// Groups of a notebook in display order
    fn list_groups(&self, container_id: &ContainerId) -> Result<Vec<Group>>;

    /// Remove a group permanently
    fn delete_group(&self, id: &GroupId) -> Result<bool>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn alias_of(&self, temporary_id: &str) -> Result<Option<String>> {
        let durable = self
            .conn
            .query_row(
                "SELECT durable_id FROM promoted_ids WHERE temporary_id = ?",
                params![temporary_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(durable)
    }

    fn resolve_group(&self, id: &GroupId) -> Result<GroupId> {
        if let GroupId::Temporary(temporary) = id {
            if let Some(durable) = self.alias_of(temporary)? {
                return Ok(GroupId::Durable(durable));
            }
        }
        Ok(id.clone())
    }

    /// Parse a note from a database row
    fn parse_note(row: &Row<'_>) -> rusqlite::Result<Note> {
        let id_kind: String = row.get(1)?;
        let group_kind: String = row.get(4)?;
        Ok(Note {
            id: RecordId::from_parts(parse_kind(&id_kind, 1)?, row.get(0)?)
                .map_err(|e| conversion_error(1, e))?,
            container_id: ContainerId::new(row.get::<_, String>(2)?),
            group_id: GroupId::from_parts(parse_kind(&group_kind, 4)?, row.get(3)?)
                .map_err(|e| conversion_error(3, e))?,
            owner_id: row.get(5)?,
            title: row.get(6)?,
            content: row.get(7)?,
            plain_text: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            deleted_at: row.get(11)?,
        })
    }

    fn parse_group(row: &Row<'_>) -> rusqlite::Result<Group> {
        let id_kind: String = row.get(1)?;
        Ok(Group {
            id: GroupId::from_parts(parse_kind(&id_kind, 1)?, row.get(0)?)
                .map_err(|e| conversion_error(0, e))?,
            container_id: ContainerId::new(row.get::<_, String>(2)?),
            name: row.get(3)?,
            is_staple: row.get::<_, i32>(4)? != 0,
            position: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

fn conversion_error(column: usize, error: crate::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(error),
    )
}

fn parse_kind(value: &str, column: usize) -> rusqlite::Result<IdKind> {
    value
        .parse::<IdKind>()
        .map_err(|e| conversion_error(column, e))
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn put(&self, note: &Note) -> Result<RecordId> {
        let id = self.resolve_id(&note.id)?;
        let group_id = self.resolve_group(&note.group_id)?;

        self.conn.execute(
            "INSERT INTO records (id, id_kind, container_id, group_id, group_kind, owner_id, title,
                                  content, plain_text, created_at, updated_at, deleted_at,
                                  local_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                id_kind = excluded.id_kind,
                container_id = excluded.container_id,
                group_id = excluded.group_id,
                group_kind = excluded.group_kind,
                owner_id = excluded.owner_id,
                title = excluded.title,
                content = excluded.content,
                plain_text = excluded.plain_text,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at,
                local_modified_at = excluded.local_modified_at",
            params![
                id.as_str(),
                id.kind().as_str(),
                note.container_id.as_str(),
                group_id.as_str(),
                group_id.kind().as_str(),
                note.owner_id,
                note.title,
                note.content,
                note.plain_text,
                note.created_at,
                note.updated_at,
                note.deleted_at,
                now_millis(),
            ],
        )?;

        Ok(id)
    }

    fn get(&self, id: &RecordId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM records WHERE id = ?"),
                params![id.as_str()],
                Self::parse_note,
            )
            .optional()?;
        Ok(note)
    }

    fn get_all(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM records ORDER BY local_modified_at DESC, rowid DESC"
        ))?;

        let notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn delete(&self, id: &RecordId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM records WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn resolve_id(&self, id: &RecordId) -> Result<RecordId> {
        if let RecordId::Temporary(temporary) = id {
            if let Some(durable) = self.alias_of(temporary)? {
                return Ok(RecordId::Durable(durable));
            }
        }
        Ok(id.clone())
    }

    fn put_group(&self, group: &Group) -> Result<()> {
        let id = self.resolve_group(&group.id)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO note_groups (id, id_kind, container_id, name, is_staple,
                                                 position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.as_str(),
                id.kind().as_str(),
                group.container_id.as_str(),
                group.name,
                i32::from(group.is_staple),
                group.position,
                group.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        let id = self.resolve_group(id)?;
        let group = self
            .conn
            .query_row(
                "SELECT id, id_kind, container_id, name, is_staple, position, created_at
                 FROM note_groups WHERE id = ?",
                params![id.as_str()],
                Self::parse_group,
            )
            .optional()?;
        Ok(group)
    }

    fn list_groups(&self, container_id: &ContainerId) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, id_kind, container_id, name, is_staple, position, created_at
             FROM note_groups
             WHERE container_id = ?
             ORDER BY is_staple DESC, position ASC",
        )?;

        let groups = stmt
            .query_map(params![container_id.as_str()], Self::parse_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(groups)
    }

    fn delete_group(&self, id: &GroupId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM note_groups WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }
}
