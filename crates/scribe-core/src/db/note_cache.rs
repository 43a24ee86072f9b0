//! Note cache repository implementation

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};
use crate::util::now_millis;
use libsql::Connection;

/// Trait for the local note cache (async)
#[allow(async_fn_in_trait)]
pub trait NoteCacheRepository {
    /// Get a cached note by ID; a missing key is `None`, never an error
    async fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Insert or overwrite the record for `note.id` (last write wins)
    async fn put(&self, note: &Note) -> Result<()>;

    /// Remove a cached note; removing a missing key is a no-op
    async fn delete(&self, id: &NoteId) -> Result<()>;

    /// All cached notes, newest first
    async fn list(&self) -> Result<Vec<Note>>;

    /// Record that a temporary id was replaced by a server-assigned id
    async fn put_alias(&self, temp_id: &NoteId, server_id: &NoteId) -> Result<()>;

    /// Resolve an id through the alias table, returning it unchanged when unaliased
    async fn resolve_alias(&self, id: &NoteId) -> Result<NoteId>;

    /// Record the alias and move the cached record to `server_id`, all or nothing
    async fn rekey(&self, temp_id: &NoteId, server_id: &NoteId) -> Result<()>;
}

/// libSQL implementation of `NoteCacheRepository`
pub struct LibSqlNoteCache<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlNoteCache<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_record(raw: &str) -> Result<Note> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl NoteCacheRepository for LibSqlNoteCache<'_> {
    async fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let mut rows = self
            .conn
            .query(
                "SELECT record FROM notes WHERE id = ?",
                libsql::params![id.as_str()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            Ok(Some(Self::parse_record(&raw)?))
        } else {
            Ok(None)
        }
    }

    async fn put(&self, note: &Note) -> Result<()> {
        let record = serde_json::to_string(note)?;
        self.conn
            .execute(
                "INSERT INTO notes (id, updated_at, record) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    updated_at = excluded.updated_at,
                    record = excluded.record",
                libsql::params![note.id.as_str(), note.updated_at, record],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM notes WHERE id = ?",
                libsql::params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Note>> {
        let mut rows = self
            .conn
            .query(
                "SELECT record FROM notes ORDER BY updated_at DESC, id ASC",
                (),
            )
            .await?;

        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            match Self::parse_record(&raw) {
                Ok(note) => notes.push(note),
                Err(error) => tracing::warn!("Skipping unreadable cached note: {error}"),
            }
        }
        Ok(notes)
    }

    async fn put_alias(&self, temp_id: &NoteId, server_id: &NoteId) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO note_aliases (temp_id, server_id, created_at)
                 VALUES (?, ?, ?)",
                libsql::params![temp_id.as_str(), server_id.as_str(), now_millis()],
            )
            .await?;
        Ok(())
    }

    async fn resolve_alias(&self, id: &NoteId) -> Result<NoteId> {
        let mut rows = self
            .conn
            .query(
                "SELECT server_id FROM note_aliases WHERE temp_id = ?",
                libsql::params![id.as_str()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let server_id: String = row.get(0)?;
            Ok(NoteId::new(server_id))
        } else {
            Ok(id.clone())
        }
    }

    async fn rekey(&self, temp_id: &NoteId, server_id: &NoteId) -> Result<()> {
        self.conn.execute("BEGIN", ()).await?;

        let moved = async {
            self.put_alias(temp_id, server_id).await?;
            if let Some(mut note) = self.get(temp_id).await? {
                note.id = server_id.clone();
                self.put(&note).await?;
                self.delete(temp_id).await?;
            }
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = moved {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::NotePayload;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn note(id: &str, updated_at: i64) -> Note {
        let mut note = Note::from_payload(
            NoteId::new(id),
            &NotePayload::new("Title", "Body", None, ["tag"]),
        );
        note.updated_at = updated_at;
        note
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_is_none() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());

        assert!(repo.get(&NoteId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());

        let stored = note("n1", 10);
        repo.put(&stored).await.unwrap();

        let fetched = repo.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_overwrites_single_record() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());

        repo.put(&note("n1", 10)).await.unwrap();
        let mut newer = note("n1", 20);
        newer.content = "Changed".into();
        repo.put(&newer).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "Changed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_newest_first() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());

        repo.put(&note("old", 1)).await.unwrap();
        repo.put(&note("new", 3)).await.unwrap();
        repo.put(&note("mid", 2)).await.unwrap();

        let ids = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());

        repo.put(&note("n1", 1)).await.unwrap();
        repo.delete(&NoteId::new("n1")).await.unwrap();
        repo.delete(&NoteId::new("n1")).await.unwrap(); // Missing key is fine

        assert!(repo.get(&NoteId::new("n1")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_alias_resolution() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());

        let temp = NoteId::new("temp-1");
        let unaliased = NoteId::new("other");
        repo.put_alias(&temp, &NoteId::new("srv-1")).await.unwrap();

        assert_eq!(repo.resolve_alias(&temp).await.unwrap().as_str(), "srv-1");
        assert_eq!(repo.resolve_alias(&unaliased).await.unwrap(), unaliased);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_rekey_leaves_no_alias() {
        let db = setup().await;
        let repo = LibSqlNoteCache::new(db.connection());
        db.connection()
            .execute(
                "INSERT INTO notes (id, updated_at, record) VALUES ('temp-1', 1, '{broken')",
                (),
            )
            .await
            .unwrap();

        let temp = NoteId::new("temp-1");
        assert!(repo.rekey(&temp, &NoteId::new("srv-1")).await.is_err());

        assert_eq!(repo.resolve_alias(&temp).await.unwrap(), temp);
        // the connection is usable again after the rollback
        repo.put(&note("n2", 1)).await.unwrap();
        assert!(repo.get(&NoteId::new("n2")).await.unwrap().is_some());
    }
}
