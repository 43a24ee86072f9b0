//! Connectivity signal shared by the sync manager and editing surfaces.

use std::sync::Arc;

use tokio::sync::watch;

/// Observable online/offline flag.
///
/// The host (a probe loop, an OS hook, a test) calls [`set_online`] and
/// subscribers see every transition.
///
/// [`set_online`]: ConnectivityWatcher::set_online
#[derive(Clone, Debug)]
pub struct ConnectivityWatcher {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityWatcher {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the flag. Returns `true` when this changed the state.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Receiver notified on every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once the flag is online (immediately if it already is)
    pub async fn wait_for_online(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this only returns once online
        let _ = rx.wait_for(|online| *online).await;
    }
}

impl Default for ConnectivityWatcher {
    fn default() -> Self {
        Self::new(true)
    }
}
