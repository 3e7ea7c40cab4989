//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: record cache, groups and the sync queue
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            id_kind TEXT NOT NULL,
            container_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            group_kind TEXT NOT NULL,
            owner_id TEXT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            plain_text TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            local_modified_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_local_modified ON records(local_modified_at DESC);
        CREATE INDEX IF NOT EXISTS idx_records_container ON records(container_id);
        CREATE INDEX IF NOT EXISTS idx_records_group ON records(group_id);
        CREATE TABLE IF NOT EXISTS note_groups (
            id TEXT PRIMARY KEY,
            id_kind TEXT NOT NULL,
            container_id TEXT NOT NULL,
            name TEXT NOT NULL,
            is_staple INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_note_groups_container ON note_groups(container_id, position);
        CREATE TABLE IF NOT EXISTS sync_queue (
            target_id TEXT PRIMARY KEY,
            target_kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            enqueued_at INTEGER NOT NULL,
            revision INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_sync_queue_enqueued ON sync_queue(enqueued_at);
        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: aliases from promoted temporary IDs
fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS promoted_ids (
            temporary_id TEXT PRIMARY KEY,
            durable_id TEXT NOT NULL,
            entity TEXT NOT NULL,
            promoted_at INTEGER NOT NULL
        );
        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_create_both_tables() {
        let conn = setup();
        run(&conn).unwrap();

        assert!(table_exists(&conn, "records"));
        assert!(table_exists(&conn, "sync_queue"));
        assert!(table_exists(&conn, "promoted_ids"));
    }
}
