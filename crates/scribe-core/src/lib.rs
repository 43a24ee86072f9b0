//! scribe-core - Core library for Scribe
//!
//! Offline-first note persistence: the note models, the durable local store
//! with its mutation outbox, the reconciler that picks between server and
//! cached copies, the sync manager that replays queued mutations, and the
//! save coordinator used by editing surfaces.

pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteId};
