//! Pending operation (outbox entry) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::note::{NoteId, NotePayload};
use crate::error::{Error, Result};

/// The kind of mutation an outbox entry replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    /// Stored kind this client does not recognize; never enqueued, only read back
    Unknown,
}

impl OperationKind {
    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether this kind carries a payload
    #[must_use]
    pub const fn requires_payload(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!(
                "unknown operation kind: {other}"
            ))),
        }
    }
}

/// A mutation intent to be appended to the outbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub note_id: NoteId,
    pub data: Option<NotePayload>,
}

impl NewOperation {
    pub const fn create(note_id: NoteId, data: NotePayload) -> Self {
        Self {
            kind: OperationKind::Create,
            note_id,
            data: Some(data),
        }
    }

    pub const fn update(note_id: NoteId, data: NotePayload) -> Self {
        Self {
            kind: OperationKind::Update,
            note_id,
            data: Some(data),
        }
    }

    pub const fn delete(note_id: NoteId) -> Self {
        Self {
            kind: OperationKind::Delete,
            note_id,
            data: None,
        }
    }

    /// Check the input constraints for enqueueing.
    ///
    /// Create/update must carry data; data passed with a delete is dropped.
    pub fn validate(mut self) -> Result<Self> {
        if self.kind == OperationKind::Unknown {
            return Err(Error::InvalidInput(format!(
                "cannot queue an operation of unknown kind for note {}",
                self.note_id
            )));
        }
        if self.kind.requires_payload() && self.data.is_none() {
            return Err(Error::InvalidInput(format!(
                "{} operation for note {} requires data",
                self.kind, self.note_id
            )));
        }
        if !self.kind.requires_payload() {
            self.data = None;
        }
        Ok(self)
    }
}

/// A durable outbox entry awaiting replay against the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Auto-assigned queue position
    pub id: i64,
    pub kind: OperationKind,
    /// Target note; a temporary id for a create made offline
    pub note_id: NoteId,
    /// Snapshot of the values to apply (absent for delete)
    pub data: Option<NotePayload>,
    /// Enqueue time (Unix ms), diagnostics only
    pub timestamp: i64,
}
