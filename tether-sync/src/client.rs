//! The shared connection slot.
//!
//! Query primitives and the channel bridge all need to know whether a client
//! is currently connected, and to react when that changes. [`ClientHandle`]
//! is a cloneable slot holding `Option<Arc<C>>`: the application connects and
//! disconnects through it, everyone else observes it.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable handle to the (possibly absent) connected client.
///
/// Clones share the same slot. Swapping in a new client wakes every watcher,
/// which is how the bridge learns it must resubscribe after a reconnect.
pub struct ClientHandle<C> {
    tx: watch::Sender<Option<Arc<C>>>,
}

impl<C> Clone for ClientHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> ClientHandle<C> {
    /// Creates a handle with no client connected.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Installs `client` as the connected client, waking all watchers.
    pub fn connect(&self, client: Arc<C>) {
        self.tx.send_replace(Some(client));
    }

    /// Clears the connected client, waking all watchers.
    pub fn disconnect(&self) {
        self.tx.send_replace(None);
    }

    /// The currently connected client, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<C>> {
        self.tx.borrow().clone()
    }

    /// Whether a client is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Subscribes to connection changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<Arc<C>>> {
        self.tx.subscribe()
    }
}

impl<C> Default for ClientHandle<C> {
    fn default() -> Self {
        Self::new()
    }
}
