//! Trigger fired explicitly by the host application.

use super::{PersistListener, PersistTrigger};
use crate::listeners::ListenerSet;
use crate::types::ListenerId;
use tracing::debug;

/// Trigger the application fires itself, e.g. from its shutdown path.
#[derive(Default)]
pub struct ManualTrigger {
    listeners: ListenerSet<dyn Fn() + Send + Sync>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every subscriber in registration order. Returns how many ran.
    pub fn fire(&self) -> usize {
        let listeners = self.listeners.snapshot();
        debug!(listeners = listeners.len(), "Persist trigger fired");
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl PersistTrigger for ManualTrigger {
    fn subscribe(&self, listener: PersistListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fire_reaches_subscribers_until_unsubscribed() {
        let trigger = ManualTrigger::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let id = trigger.subscribe(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(trigger.fire(), 1);
        assert!(trigger.unsubscribe(id));
        assert_eq!(trigger.fire(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
