//! Durable local storage for Scribe

mod connection;
mod migrations;
mod note_cache;
mod outbox;

pub use connection::Database;
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use note_cache::{LibSqlNoteCache, NoteCacheRepository};
pub use outbox::{LibSqlOutbox, OutboxRepository};
