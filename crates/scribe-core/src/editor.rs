//! Save coordination for editing surfaces.
//!
//! A save first tries the server directly and leaves the local store alone
//! when that succeeds. When it is skipped (offline) or fails, the note is
//! written to the local store and the mutation is queued for the sync manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{NewOperation, Note, NoteId, NotePayload};
use crate::state::SaveStatus;
use crate::store::LocalStore;
use crate::sync::{NoteServer, SyncManager};

/// Where a save ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server accepted the mutation
    Server { id: NoteId },
    /// Stored locally and queued for replay
    Local { id: NoteId },
    /// The local fallback failed too; the change may be lost
    Failed { id: NoteId, error: String },
}

impl SaveOutcome {
    pub const fn id(&self) -> &NoteId {
        match self {
            Self::Server { id } | Self::Local { id } | Self::Failed { id, .. } => id,
        }
    }

    pub const fn status(&self) -> SaveStatus {
        match self {
            Self::Server { .. } => SaveStatus::Synced,
            Self::Local { .. } => SaveStatus::SavedLocally,
            Self::Failed { .. } => SaveStatus::Failed,
        }
    }
}

/// Create, update and delete notes with offline fallback
pub struct NoteEditor<S> {
    sync: SyncManager<S>,
}

impl<S> Clone for NoteEditor<S> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
        }
    }
}

impl<S: NoteServer> NoteEditor<S> {
    pub const fn new(sync: SyncManager<S>) -> Self {
        Self { sync }
    }

    pub const fn sync_manager(&self) -> &SyncManager<S> {
        &self.sync
    }

    fn store(&self) -> &LocalStore {
        self.sync.store()
    }

    /// Create a note. Only an invalid payload is an `Err`.
    pub async fn create(&self, payload: NotePayload) -> Result<SaveOutcome> {
        payload.validate()?;

        if self.sync.is_online() {
            match self.sync.server().create_note(&payload).await {
                Ok(created) => return Ok(SaveOutcome::Server { id: created.id }),
                Err(error) => tracing::warn!("Create failed, saving locally: {error}"),
            }
        }

        let id = NoteId::generate();
        let note = Note::from_payload(id.clone(), &payload);
        Ok(self
            .save_locally(note, NewOperation::create(id, payload))
            .await)
    }

    /// Update a note. `id` may be a temporary id that has since been replaced.
    pub async fn update(&self, id: NoteId, payload: NotePayload) -> Result<SaveOutcome> {
        payload.validate()?;
        let id = self.resolve(id).await;

        if self.sync.is_online() {
            match self.sync.server().update_note(&id, &payload).await {
                Ok(()) => return Ok(SaveOutcome::Server { id }),
                Err(error) => tracing::warn!("Update of note {id} failed, saving locally: {error}"),
            }
        }

        let note = match self.store().get_note(&id).await {
            Ok(Some(mut existing)) => {
                existing.apply_payload(&payload);
                existing
            }
            Ok(None) => Note::from_payload(id.clone(), &payload),
            Err(error) => {
                tracing::warn!("Could not read cached note {id}: {error}");
                Note::from_payload(id.clone(), &payload)
            }
        };
        Ok(self
            .save_locally(note, NewOperation::update(id, payload))
            .await)
    }

    /// Delete a note. The local fallback only queues the delete.
    pub async fn delete(&self, id: NoteId) -> Result<SaveOutcome> {
        let id = self.resolve(id).await;

        if self.sync.is_online() {
            match self.sync.server().delete_note(&id).await {
                Ok(()) => {
                    if let Err(error) = self.store().delete_note(&id).await {
                        tracing::debug!("Could not drop cached note {id}: {error}");
                    }
                    return Ok(SaveOutcome::Server { id });
                }
                Err(error) => tracing::warn!("Delete of note {id} failed, queueing: {error}"),
            }
        }

        Ok(match self.sync.enqueue(NewOperation::delete(id.clone())).await {
            Ok(_) => SaveOutcome::Local { id },
            Err(error) => {
                tracing::error!("Could not queue delete of note {id}: {error}");
                SaveOutcome::Failed {
                    id,
                    error: error.to_string(),
                }
            }
        })
    }

    async fn save_locally(&self, note: Note, operation: NewOperation) -> SaveOutcome {
        let id = note.id.clone();
        let result = async {
            self.store().put_note(&note).await?;
            self.sync.enqueue(operation).await
        }
        .await;

        match result {
            Ok(_) => SaveOutcome::Local { id },
            Err(error) => {
                tracing::error!("Local save of note {id} failed: {error}");
                SaveOutcome::Failed {
                    id,
                    error: error.to_string(),
                }
            }
        }
    }

    async fn resolve(&self, id: NoteId) -> NoteId {
        match self.store().resolve_alias(&id).await {
            Ok(resolved) => resolved,
            Err(error) => {
                tracing::debug!("Could not resolve alias for note {id}: {error}");
                id
            }
        }
    }
}

struct AutoSaverInner<S> {
    editor: NoteEditor<S>,
    delay: Duration,
    generation: AtomicU64,
    save_lock: Mutex<()>,
    status: watch::Sender<SaveStatus>,
}

/// Debounced auto-save for an editing session.
///
/// Each [`schedule`](Self::schedule) supersedes the pending save; only the
/// last one fires, `delay` after it was scheduled. Saves never overlap, and a
/// superseded or cancelled timer never writes.
pub struct AutoSaver<S> {
    inner: Arc<AutoSaverInner<S>>,
}

impl<S> Clone for AutoSaver<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: NoteServer> AutoSaver<S> {
    pub fn new(editor: NoteEditor<S>, delay: Duration) -> Self {
        let (status, _rx) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(AutoSaverInner {
                editor,
                delay,
                generation: AtomicU64::new(0),
                save_lock: Mutex::new(()),
                status,
            }),
        }
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Schedule a save of `payload` to note `id`, superseding any pending one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, id: NoteId, payload: NotePayload) -> Result<JoinHandle<()>> {
        payload.validate()?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let saver = self.clone();
        Ok(tokio::spawn(async move {
            tokio::time::sleep(saver.inner.delay).await;
            if saver.is_stale(generation) {
                return;
            }

            let _saving = saver.inner.save_lock.lock().await;
            // Re-checked under the lock: a submit may have run while we waited
            if !saver.is_stale(generation) {
                saver.save(id, payload).await;
            }
        }))
    }

    /// Save immediately, cancelling any pending auto-save first
    pub async fn submit(&self, id: NoteId, payload: NotePayload) -> Result<SaveOutcome> {
        payload.validate()?;
        self.cancel();

        let _saving = self.inner.save_lock.lock().await;
        Ok(self.save(id, payload).await)
    }

    /// Drop the pending auto-save, if any
    pub fn cancel(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) != generation
    }

    async fn save(&self, id: NoteId, payload: NotePayload) -> SaveOutcome {
        self.inner.status.send_replace(SaveStatus::Saving);
        let outcome = match self.inner.editor.update(id.clone(), payload).await {
            Ok(outcome) => outcome,
            Err(error) => SaveOutcome::Failed {
                id,
                error: error.to_string(),
            },
        };
        self.inner.status.send_replace(outcome.status());
        outcome
    }
}
