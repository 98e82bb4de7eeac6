//! Ordered callback lists.

use crate::types::ListenerId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of listener ids, unique across every set in the process so a
/// caller can remove a listener without knowing which set holds it.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Callbacks kept in registration order.
///
/// Invocation works on a snapshot, so a callback may add or remove
/// listeners of the same set without deadlocking.
pub struct ListenerSet<F: ?Sized> {
    listeners: RwLock<Vec<(ListenerId, Arc<F>)>>,
}

impl<F: ?Sized> ListenerSet<F> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<F>) -> ListenerId {
        let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Current listeners, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl<F: ?Sized> Default for ListenerSet<F> {
    fn default() -> Self {
        Self::new()
    }
}
