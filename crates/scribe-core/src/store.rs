//! Durable local store shared by the editing surface and the sync manager.
//!
//! Wraps the libSQL database behind a lazily-opened, cloneable handle. The
//! first caller of [`LocalStore::open`] (or of any operation) initializes the
//! database; concurrent callers wait on the same initialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::db::{
    Database, LibSqlNoteCache, LibSqlOutbox, NoteCacheRepository, OutboxRepository,
};
use crate::models::{NewOperation, Note, NoteId, PendingOperation};
use crate::Result;

#[derive(Debug, Clone)]
enum StoreLocation {
    File(PathBuf),
    Memory,
}

struct StoreInner {
    location: StoreLocation,
    db: OnceCell<Mutex<Database>>,
}

/// Handle to the note cache, outbox and alias collections.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

impl LocalStore {
    /// Create a handle for a store file at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_location(StoreLocation::File(path.into()))
    }

    /// Create a handle for a throwaway in-memory store (tests, dry runs).
    pub fn in_memory() -> Self {
        Self::with_location(StoreLocation::Memory)
    }

    fn with_location(location: StoreLocation) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                location,
                db: OnceCell::new(),
            }),
        }
    }

    /// Backing file path, if this is a file store
    pub fn path(&self) -> Option<&Path> {
        match &self.inner.location {
            StoreLocation::File(path) => Some(path),
            StoreLocation::Memory => None,
        }
    }

    /// Initialize the store. Idempotent and safe to call concurrently.
    pub async fn open(&self) -> Result<()> {
        self.database().await.map(|_| ())
    }

    /// Whether the store has been initialized
    pub fn is_open(&self) -> bool {
        self.inner.db.initialized()
    }

    async fn database(&self) -> Result<&Mutex<Database>> {
        self.inner
            .db
            .get_or_try_init(|| async {
                let db = match &self.inner.location {
                    StoreLocation::File(path) => open_file_with_recovery(path).await?,
                    StoreLocation::Memory => Database::open_in_memory().await?,
                };
                Ok(Mutex::new(db))
            })
            .await
    }

    /// Fetch a cached note
    pub async fn get_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let db = self.database().await?.lock().await;
        LibSqlNoteCache::new(db.connection()).get(id).await
    }

    /// Insert or overwrite a cached note
    pub async fn put_note(&self, note: &Note) -> Result<()> {
        let db = self.database().await?.lock().await;
        LibSqlNoteCache::new(db.connection()).put(note).await
    }

    /// Remove a cached note
    pub async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let db = self.database().await?.lock().await;
        LibSqlNoteCache::new(db.connection()).delete(id).await
    }

    /// All cached notes, newest first
    pub async fn all_notes(&self) -> Result<Vec<Note>> {
        let db = self.database().await?.lock().await;
        LibSqlNoteCache::new(db.connection()).list().await
    }

    /// Append an operation to the outbox
    pub async fn add_operation(&self, operation: &NewOperation) -> Result<PendingOperation> {
        let db = self.database().await?.lock().await;
        LibSqlOutbox::new(db.connection()).add(operation).await
    }

    /// All outbox entries in FIFO order
    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        let db = self.database().await?.lock().await;
        LibSqlOutbox::new(db.connection()).list().await
    }

    /// Remove an outbox entry
    pub async fn remove_operation(&self, id: i64) -> Result<()> {
        let db = self.database().await?.lock().await;
        LibSqlOutbox::new(db.connection()).remove(id).await
    }

    /// Number of outbox entries
    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.database().await?.lock().await;
        LibSqlOutbox::new(db.connection()).count().await
    }

    /// Resolve a possibly temporary note id to its server id
    pub async fn resolve_alias(&self, id: &NoteId) -> Result<NoteId> {
        let db = self.database().await?.lock().await;
        LibSqlNoteCache::new(db.connection()).resolve_alias(id).await
    }

    /// Record that `temp_id` is now known to the server as `server_id`, and move
    /// the cached record (if any) to the new key in one transaction.
    pub async fn rekey_note(&self, temp_id: &NoteId, server_id: &NoteId) -> Result<()> {
        let db = self.database().await?.lock().await;
        LibSqlNoteCache::new(db.connection())
            .rekey(temp_id, server_id)
            .await
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        let db = self.database().await?.lock().await;
        db.connection().execute(sql, ()).await?;
        Ok(())
    }
}

async fn open_file_with_recovery(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match Database::open(path).await {
        Ok(db) => Ok(db),
        Err(error) if is_corrupted_db_error(&error) => {
            tracing::warn!(
                "Local store at {} is unreadable: {}. Moving it aside and starting empty.",
                path.display(),
                error
            );
            quarantine_corrupted_db_files(path)?;
            Database::open(path).await
        }
        Err(error) => Err(error),
    }
}

fn is_corrupted_db_error(error: &crate::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("file is not a database") || message.contains("malformed")
}

fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
    let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
        return Ok(());
    };

    if db_path.exists() {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted local store from {} to {}",
            db_path.display(),
            backup_path.display()
        );
    }

    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let sidecar_prefix = format!("{base_name}-");

    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(&sidecar_prefix) {
            let path = entry.path();
            std::fs::remove_file(&path)?;
            tracing::warn!("Removed stale local store file {}", path.display());
        }
    }

    Ok(())
}
