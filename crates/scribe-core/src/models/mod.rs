//! Data models for Scribe

mod note;
mod operation;
mod tag;

pub use note::{parse_tags, Note, NoteId, NotePayload};
pub use operation::{NewOperation, OperationKind, PendingOperation};
pub use tag::{Tag, TagId};
