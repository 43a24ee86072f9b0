//! Database migrations
//!
//! Each version adds a record collection. Bump `CURRENT_VERSION` whenever the
//! collection set changes; older stores are upgraded in place.

use crate::error::Result;
use libsql::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1_NOTE_CACHE).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2_SYNC_QUEUE).await?;
    }
    if version < 3 {
        apply(conn, 3, &V3_NOTE_ALIASES).await?;
    }

    Ok(())
}

/// Get the current schema version
pub async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: schema tracking and the note cache
const V1_NOTE_CACHE: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    // One record per note id; the full record is stored as JSON
    "CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        updated_at INTEGER NOT NULL,
        record TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at DESC)",
];

/// Version 2: pending operation outbox
const V2_SYNC_QUEUE: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS sync_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        note_id TEXT NOT NULL,
        payload TEXT,
        timestamp INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_note_id ON sync_queue(note_id)",
];

/// Version 3: temporary-to-server id aliases for creates replayed from the outbox
const V3_NOTE_ALIASES: [&str; 1] = ["CREATE TABLE IF NOT EXISTS note_aliases (
        temp_id TEXT PRIMARY KEY,
        server_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )"];

/// Apply one migration atomically and record its version
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            libsql::params![i64::from(version)],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated local store to version {version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                libsql::params![name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_creates_all_collections() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in ["notes", "sync_queue", "note_aliases"] {
            assert!(table_exists(&conn, table).await, "missing {table}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upgrade_from_v1_keeps_cached_notes() {
        let conn = setup().await;
        apply(&conn, 1, &V1_NOTE_CACHE).await.unwrap();
        conn.execute(
            "INSERT INTO notes (id, updated_at, record) VALUES ('n1', 5, '{}')",
            (),
        )
        .await
        .unwrap();

        run(&conn).await.unwrap();

        assert_eq!(get_version(&conn).await.unwrap(), CURRENT_VERSION);
        let mut rows = conn
            .query("SELECT COUNT(*) FROM notes", ())
            .await
            .unwrap();
        let count = rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap();
        assert_eq!(count, 1);
    }
}
