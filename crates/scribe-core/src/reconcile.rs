//! Choosing between the server copy of a note and the locally cached copy.
//!
//! The cached record wins only when its `updated_at` is strictly newer than the
//! server's. Equal timestamps resolve to the server copy even when the content
//! differs.

use crate::models::Note;
use crate::store::LocalStore;

/// Which copy of a note was chosen for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Server,
    Local,
}

/// What to do with the cache when the server copy wins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Overwrite the cached record with the server copy
    #[default]
    Warm,
    /// Leave the cache untouched
    ReadOnly,
}

/// Result of reconciling one note load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub note: Note,
    pub source: VersionSource,
}

impl Reconciled {
    /// Whether the displayed copy has local changes the server has not seen
    #[must_use]
    pub fn is_unsynced_local(&self) -> bool {
        self.source == VersionSource::Local
    }
}

/// Pick the copy to display given the server note and the cached record.
#[must_use]
pub fn choose_version(server: &Note, local: Option<&Note>) -> VersionSource {
    match local {
        Some(local) if local.updated_at > server.updated_at => VersionSource::Local,
        _ => VersionSource::Server,
    }
}

/// Reconcile a freshly fetched server note against the local store.
///
/// Store failures never fail the load: an unreadable cache counts as "no local
/// record", and a failed cache warm is only logged.
pub async fn reconcile(store: &LocalStore, server: Note, policy: CachePolicy) -> Reconciled {
    let local = match store.get_note(&server.id).await {
        Ok(local) => local,
        Err(error) => {
            tracing::warn!("Could not read cached copy of note {}: {error}", server.id);
            None
        }
    };

    match (choose_version(&server, local.as_ref()), local) {
        (VersionSource::Local, Some(local)) => {
            tracing::debug!(
                "Showing unsynced local version of note {} ({} > {})",
                local.id,
                local.updated_at,
                server.updated_at
            );
            Reconciled {
                note: local,
                source: VersionSource::Local,
            }
        }
        _ => {
            if policy == CachePolicy::Warm {
                if let Err(error) = store.put_note(&server).await {
                    tracing::warn!("Could not cache server copy of note {}: {error}", server.id);
                }
            }
            Reconciled {
                note: server,
                source: VersionSource::Server,
            }
        }
    }
}
