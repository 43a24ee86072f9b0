#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scribe_core::models::{Note, NoteId, NotePayload};
use scribe_core::store::LocalStore;
use scribe_core::sync::{ConnectivityWatcher, CreatedNote, NoteServer, SyncManager};
use scribe_core::{Error, Result};

/// A call the fake server received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Update(String, String),
    Delete(String),
}

#[derive(Default)]
struct FakeState {
    notes: HashMap<NoteId, Note>,
    calls: Vec<Call>,
    failing: HashSet<String>,
    down: bool,
    delay: Option<Duration>,
    next_id: usize,
}

/// In-memory notes server. Cloning shares state.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail
    pub fn set_down(&self, down: bool) {
        self.state.lock().unwrap().down = down;
    }

    /// Make mutations of this note id fail
    pub fn fail_for(&self, id: &str) {
        self.state.lock().unwrap().failing.insert(id.to_string());
    }

    /// Make every mutation take `delay` before it is applied
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    async fn pause(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn recover(&self, id: &str) {
        self.state.lock().unwrap().failing.remove(id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn note(&self, id: &str) -> Option<Note> {
        self.state.lock().unwrap().notes.get(&NoteId::new(id)).cloned()
    }

    pub fn note_count(&self) -> usize {
        self.state.lock().unwrap().notes.len()
    }

    /// Put a note on the server as if another client had written it
    pub fn seed(&self, id: &str, content: &str, updated_at: i64) -> Note {
        let mut note = Note::from_payload(
            NoteId::new(id),
            &NotePayload::new("Seeded", content, None, ["server"]),
        );
        note.created_at = updated_at;
        note.updated_at = updated_at;
        self.state
            .lock()
            .unwrap()
            .notes
            .insert(note.id.clone(), note.clone());
        note
    }

    fn check(state: &FakeState, id: &str) -> Result<()> {
        if state.down {
            return Err(Error::Api {
                status: 503,
                message: "server unavailable".to_string(),
            });
        }
        if state.failing.contains(id) {
            return Err(Error::Api {
                status: 400,
                message: format!("rejected {id}"),
            });
        }
        Ok(())
    }
}

impl NoteServer for FakeServer {
    async fn create_note(&self, payload: &NotePayload) -> Result<CreatedNote> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(payload.title.clone()));
        Self::check(&state, &payload.title)?;

        state.next_id += 1;
        let id = NoteId::new(format!("srv-{}", state.next_id));
        let note = Note::from_payload(id.clone(), payload);
        state.notes.insert(id.clone(), note);
        Ok(CreatedNote { id })
    }

    async fn update_note(&self, id: &NoteId, payload: &NotePayload) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Update(id.to_string(), payload.content.clone()));
        Self::check(&state, id.as_str())?;

        let note = state
            .notes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        note.apply_payload(payload);
        Ok(())
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(id.to_string()));
        Self::check(&state, id.as_str())?;

        state.notes.remove(id);
        Ok(())
    }

    async fn fetch_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let state = self.state.lock().unwrap();
        Self::check(&state, "")?;
        Ok(state.notes.get(id).cloned())
    }

    async fn current_user(&self) -> Result<Option<String>> {
        Ok(Some("user-1".to_string()))
    }
}

pub fn payload(title: &str, content: &str) -> NotePayload {
    NotePayload::new(title, content, Some("work".to_string()), ["a", "b"])
}

pub struct Harness {
    pub server: FakeServer,
    pub store: LocalStore,
    pub connectivity: ConnectivityWatcher,
    pub manager: SyncManager<FakeServer>,
}

pub fn harness(online: bool) -> Harness {
    harness_with_store(LocalStore::in_memory(), online)
}

pub fn harness_with_store(store: LocalStore, online: bool) -> Harness {
    let server = FakeServer::new();
    let connectivity = ConnectivityWatcher::new(online);
    let manager = SyncManager::new(store.clone(), server.clone(), connectivity.clone());
    Harness {
        server,
        store,
        connectivity,
        manager,
    }
}

/// Poll `check` until it returns true, panicking after two seconds
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
