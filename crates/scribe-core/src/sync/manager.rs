//! Outbox drain coordinator.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::{ConnectivityWatcher, NoteServer};
use crate::error::{Error, Result};
use crate::models::{NewOperation, NoteId, NotePayload, OperationKind, PendingOperation};
use crate::state::SyncState;
use crate::store::LocalStore;

/// Where a drain stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHalt {
    pub operation_id: i64,
    pub kind: OperationKind,
    pub note_id: NoteId,
    pub error: String,
}

/// Outcome of one [`SyncManager::sync`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries replayed and removed during this drain
    pub replayed: usize,
    /// Entries still queued afterwards
    pub remaining: usize,
    pub halted_on: Option<SyncHalt>,
    /// The drain did not run because the client is offline
    pub skipped_offline: bool,
}

impl SyncReport {
    fn offline(remaining: usize) -> Self {
        Self {
            remaining,
            skipped_offline: true,
            ..Self::default()
        }
    }

    /// Whether everything queued has reached the server
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !self.skipped_offline && self.halted_on.is_none() && self.remaining == 0
    }
}

struct Inner<S> {
    store: LocalStore,
    server: S,
    connectivity: ConnectivityWatcher,
    drain_lock: Mutex<()>,
    state: watch::Sender<SyncState>,
}

/// Drains the outbox against a [`NoteServer`].
///
/// Cloning is cheap; clones share the same store, server and drain lock.
pub struct SyncManager<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SyncManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: NoteServer> SyncManager<S> {
    pub fn new(store: LocalStore, server: S, connectivity: ConnectivityWatcher) -> Self {
        let initial = if connectivity.is_online() {
            SyncState::Synced
        } else {
            SyncState::Offline
        };
        let (state, _rx) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                store,
                server,
                connectivity,
                drain_lock: Mutex::new(()),
                state,
            }),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn server(&self) -> &S {
        &self.inner.server
    }

    pub fn connectivity(&self) -> &ConnectivityWatcher {
        &self.inner.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.inner.store.pending_count().await
    }

    fn publish(&self, state: SyncState) {
        self.inner.state.send_replace(state);
    }

    /// Queue a mutation for replay.
    ///
    /// When online, a drain is started in the background; its result is only
    /// logged.
    pub async fn enqueue(&self, operation: NewOperation) -> Result<PendingOperation> {
        let operation = operation.validate()?;
        if let Some(data) = &operation.data {
            data.validate()?;
        }

        let pending = self.inner.store.add_operation(&operation).await?;
        tracing::debug!(
            "Queued {} for note {} as entry {}",
            pending.kind,
            pending.note_id,
            pending.id
        );

        if self.is_online() {
            self.spawn_sync();
        }
        Ok(pending)
    }

    /// Start a drain on the runtime without waiting for it
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(error) = manager.sync().await {
                tracing::warn!("Background sync failed: {error}");
            }
        })
    }

    /// Replay queued mutations in order, stopping at the first failure.
    ///
    /// Does nothing while offline. Concurrent calls are serialized, and each
    /// drain reads the outbox only after it holds the drain lock.
    pub async fn sync(&self) -> Result<SyncReport> {
        if !self.is_online() {
            self.publish(SyncState::Offline);
            let remaining = self.inner.store.pending_count().await?;
            return Ok(SyncReport::offline(remaining));
        }

        let _drain = self.inner.drain_lock.lock().await;
        self.publish(SyncState::Syncing);

        match self.drain().await {
            Ok(report) => {
                self.publish(if report.halted_on.is_some() {
                    SyncState::Error
                } else {
                    SyncState::Synced
                });
                Ok(report)
            }
            Err(error) => {
                self.publish(SyncState::Error);
                Err(error)
            }
        }
    }

    async fn drain(&self) -> Result<SyncReport> {
        let operations = self.inner.store.pending_operations().await?;
        let mut report = SyncReport::default();

        for operation in operations {
            match self.replay(&operation).await {
                Ok(()) => {
                    self.inner.store.remove_operation(operation.id).await?;
                    report.replayed += 1;
                    tracing::debug!(
                        "Replayed {} for note {} (entry {})",
                        operation.kind,
                        operation.note_id,
                        operation.id
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        "Sync halted at entry {} ({} {}): {error}",
                        operation.id,
                        operation.kind,
                        operation.note_id
                    );
                    report.halted_on = Some(SyncHalt {
                        operation_id: operation.id,
                        kind: operation.kind,
                        note_id: operation.note_id.clone(),
                        error: error.to_string(),
                    });
                    break;
                }
            }
        }

        report.remaining = self.inner.store.pending_count().await?;
        if report.replayed > 0 || report.halted_on.is_some() {
            tracing::info!(
                "Sync replayed {} queued change(s), {} remaining",
                report.replayed,
                report.remaining
            );
        }
        Ok(report)
    }

    async fn replay(&self, operation: &PendingOperation) -> Result<()> {
        let server = &self.inner.server;
        let target = self.inner.store.resolve_alias(&operation.note_id).await?;

        match operation.kind {
            OperationKind::Create => {
                let created = server.create_note(required_payload(operation)?).await?;
                // The server has the note now; replaying the entry would duplicate it
                if created.id != operation.note_id {
                    if let Err(error) = self
                        .inner
                        .store
                        .rekey_note(&operation.note_id, &created.id)
                        .await
                    {
                        tracing::warn!(
                            "Note {} was created on the server as {}, but the local copy was not re-keyed: {error}",
                            operation.note_id,
                            created.id
                        );
                    }
                }
            }
            OperationKind::Update => {
                server
                    .update_note(&target, required_payload(operation)?)
                    .await?;
            }
            OperationKind::Delete => server.delete_note(&target).await?,
            OperationKind::Unknown => {
                return Err(Error::InvalidInput(format!(
                    "outbox entry {} has an unrecognized kind",
                    operation.id
                )))
            }
        }
        Ok(())
    }

    /// Drain whenever connectivity comes back.
    ///
    /// Also drains once right away when already online. The returned
    /// subscription stops listening when cancelled or dropped.
    pub fn init(&self) -> SyncSubscription {
        let manager = self.clone();
        let mut online = self.inner.connectivity.subscribe();

        let handle = tokio::spawn(async move {
            // The channel keeps only the latest value, so a flap during a drain
            // shows up as a single change that is already online again.
            loop {
                let is_online = *online.borrow_and_update();
                if is_online {
                    manager.sync_logged().await;
                } else {
                    manager.publish(SyncState::Offline);
                }
                if online.changed().await.is_err() {
                    break;
                }
            }
        });

        SyncSubscription { handle }
    }

    async fn sync_logged(&self) {
        if let Err(error) = self.sync().await {
            tracing::warn!("Sync after reconnect failed: {error}");
        }
    }
}

fn required_payload(operation: &PendingOperation) -> Result<&NotePayload> {
    operation.data.as_ref().ok_or_else(|| {
        Error::InvalidInput(format!(
            "outbox entry {} ({}) has no readable payload",
            operation.id, operation.kind
        ))
    })
}

/// Handle to the reconnect listener started by [`SyncManager::init`]
#[derive(Debug)]
pub struct SyncSubscription {
    handle: JoinHandle<()>,
}

impl SyncSubscription {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SyncSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, NotePayload};
    use crate::sync::CreatedNote;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts every call and counts them
    #[derive(Default)]
    struct CountingServer {
        calls: AtomicUsize,
    }

    impl NoteServer for CountingServer {
        async fn create_note(&self, _payload: &NotePayload) -> Result<CreatedNote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CreatedNote {
                id: NoteId::generate(),
            })
        }

        async fn update_note(&self, _id: &NoteId, _payload: &NotePayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete_note(&self, _id: &NoteId) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch_note(&self, _id: &NoteId) -> Result<Option<Note>> {
            Ok(None)
        }

        async fn current_user(&self) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn manager(online: bool) -> SyncManager<CountingServer> {
        SyncManager::new(
            LocalStore::in_memory(),
            CountingServer::default(),
            ConnectivityWatcher::new(online),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_sync_is_a_noop() {
        let manager = manager(false);
        manager
            .enqueue(NewOperation::delete(NoteId::new("n1")))
            .await
            .unwrap();

        let report = manager.sync().await.unwrap();

        assert!(report.skipped_offline);
        assert_eq!(report.remaining, 1);
        assert_eq!(manager.server().calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.state(), SyncState::Offline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_rejects_missing_payload() {
        let manager = manager(false);
        let invalid = NewOperation {
            kind: OperationKind::Update,
            note_id: NoteId::new("n1"),
            data: None,
        };

        assert!(manager.enqueue(invalid).await.is_err());
        assert_eq!(manager.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_rejects_invalid_payload() {
        let manager = manager(false);
        let op = NewOperation::create(
            NoteId::new("t1"),
            NotePayload::new("", "body", None, Vec::<String>::new()),
        );

        assert!(matches!(
            manager.enqueue(op).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(manager.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_payload_halts_drain() {
        let manager = manager(false);
        let store = manager.store().clone();
        store
            .add_operation(&NewOperation {
                kind: OperationKind::Create,
                note_id: NoteId::new("t1"),
                data: None,
            })
            .await
            .unwrap();
        store
            .add_operation(&NewOperation::delete(NoteId::new("n2")))
            .await
            .unwrap();

        manager.connectivity().set_online(true);
        let report = manager.sync().await.unwrap();

        assert_eq!(report.replayed, 0);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.halted_on.unwrap().note_id.as_str(), "t1");
        assert_eq!(manager.server().calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.state(), SyncState::Error);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_reports_complete_drain() {
        let manager = manager(false);
        for id in ["n1", "n2"] {
            manager
                .enqueue(NewOperation::delete(NoteId::new(id)))
                .await
                .unwrap();
        }

        manager.connectivity().set_online(true);
        let report = manager.sync().await.unwrap();

        assert_eq!(report.replayed, 2);
        assert!(report.is_complete());
        assert_eq!(manager.state(), SyncState::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscription_stops_on_cancel() {
        let manager = manager(false);
        let subscription = manager.init();
        assert!(subscription.is_active());

        subscription.cancel();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!subscription.is_active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn confirmed_create_is_not_replayed_when_rekey_fails() {
        let manager = manager(false);
        let store = manager.store().clone();
        store
            .execute_raw(
                "INSERT INTO notes (id, updated_at, record) VALUES ('temp-1', 1, '{broken')",
            )
            .await
            .unwrap();
        store
            .add_operation(&NewOperation::create(
                NoteId::new("temp-1"),
                NotePayload::new("Draft", "body", None, Vec::<String>::new()),
            ))
            .await
            .unwrap();

        manager.connectivity().set_online(true);
        let report = manager.sync().await.unwrap();
        let again = manager.sync().await.unwrap();

        assert_eq!(report.replayed, 1);
        assert!(report.is_complete());
        assert_eq!(again.replayed, 0);
        assert_eq!(manager.server().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unrecognized_entry_halts_drain() {
        let manager = manager(false);
        let store = manager.store().clone();
        store
            .execute_raw(
                "INSERT INTO sync_queue (kind, note_id, payload, timestamp)
                 VALUES ('PATCH', 'n1', NULL, 1)",
            )
            .await
            .unwrap();
        store
            .add_operation(&NewOperation::delete(NoteId::new("n2")))
            .await
            .unwrap();

        manager.connectivity().set_online(true);
        let report = manager.sync().await.unwrap();

        let halt = report.halted_on.unwrap();
        assert_eq!(halt.kind, OperationKind::Unknown);
        assert_eq!(halt.note_id.as_str(), "n1");
        assert_eq!(report.remaining, 2);
        assert_eq!(manager.server().calls.load(Ordering::SeqCst), 0);
    }
}
