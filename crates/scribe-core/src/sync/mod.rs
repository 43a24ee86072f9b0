//! Replaying queued mutations against the notes server.
//!
//! [`NoteServer`] is the seam to the server collaborators; [`HttpNoteServer`]
//! talks to the HTTP API. [`SyncManager`] drains the outbox whenever
//! connectivity is available.

mod connectivity;
mod http;
mod manager;

use std::future::Future;

use serde::{Deserialize, Serialize};

pub use connectivity::ConnectivityWatcher;
pub use http::HttpNoteServer;
pub use manager::{SyncHalt, SyncManager, SyncReport, SyncSubscription};

use crate::models::{Note, NoteId, NotePayload};
use crate::Result;

/// Identity assigned by the server to a newly created note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedNote {
    pub id: NoteId,
}

/// Server-side note operations.
///
/// Every method may fail for network, authorization or validation reasons;
/// callers treat all failures alike.
pub trait NoteServer: Send + Sync + 'static {
    /// Create a note, returning the server-assigned id
    fn create_note(&self, payload: &NotePayload)
        -> impl Future<Output = Result<CreatedNote>> + Send;

    /// Overwrite the fields of an existing note
    fn update_note(
        &self,
        id: &NoteId,
        payload: &NotePayload,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_note(&self, id: &NoteId) -> impl Future<Output = Result<()>> + Send;

    /// Load a note; `None` when the server does not know the id
    fn fetch_note(&self, id: &NoteId) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// The signed-in user, if any
    fn current_user(&self) -> impl Future<Output = Result<Option<String>>> + Send;
}
