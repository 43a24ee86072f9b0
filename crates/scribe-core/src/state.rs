//! Shared state types observed by editing surfaces.

use std::fmt;

/// Sync state published by the sync manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "sync error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of the most recent save from an editing surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing saved yet
    #[default]
    Idle,
    Saving,
    /// The server accepted the write
    Synced,
    /// Written to the local store and queued for replay
    SavedLocally,
    /// Neither the server nor the local store accepted the write
    Failed,
}

impl SaveStatus {
    /// Message shown to the user
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Saving => "saving...",
            Self::Synced => "synced to server",
            Self::SavedLocally => "saved locally, will sync later",
            Self::Failed => "local save failed, please back up manually",
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
