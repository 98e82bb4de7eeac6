//! Event and subscription types.

use crate::types::OperationKind;
use serde::{Deserialize, Serialize};

/// Configuration for an event subscription.
#[derive(Clone, Debug)]
pub struct EventSubscriptionConfig {
    /// Max buffered events before dropping the subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: EventFilter,
}

impl Default for EventSubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: EventFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Only events for these store names (None = all stores).
    pub stores: Option<Vec<String>>,

    /// Include `StateApplied` / `StatePersisted`.
    pub include_cycles: bool,

    /// Include `PropertySkipped` / `PropertyFailed`.
    pub include_properties: bool,

    /// Include `AutoPersistCompleted`.
    pub include_auto_persist: bool,
}

impl EventFilter {
    /// Everything.
    pub fn all() -> Self {
        Self {
            stores: None,
            include_cycles: true,
            include_properties: true,
            include_auto_persist: true,
        }
    }

    /// Per-property vetoes and failures only.
    pub fn failures() -> Self {
        Self {
            include_properties: true,
            ..Default::default()
        }
    }

    /// Everything concerning the given stores.
    pub fn stores(names: Vec<String>) -> Self {
        Self {
            stores: Some(names),
            include_cycles: true,
            include_properties: true,
            ..Default::default()
        }
    }

    pub(crate) fn matches(&self, event: &TrackingEvent) -> bool {
        let category = match event {
            TrackingEvent::StateApplied { .. } | TrackingEvent::StatePersisted { .. } => {
                self.include_cycles
            }
            TrackingEvent::PropertySkipped { .. } | TrackingEvent::PropertyFailed { .. } => {
                self.include_properties
            }
            TrackingEvent::AutoPersistCompleted { .. } => self.include_auto_persist,
            TrackingEvent::Dropped { .. } => true,
        };
        if !category {
            return false;
        }

        match (&self.stores, event.store()) {
            (Some(names), Some(store)) => names.iter().any(|n| n == store),
            _ => true,
        }
    }
}

/// Events published by configurations and the tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// An apply cycle finished.
    StateApplied {
        store: String,
        applied: usize,
        defaulted: usize,
        skipped: usize,
    },

    /// A persist cycle committed.
    StatePersisted {
        store: String,
        written: usize,
        skipped: usize,
    },

    /// A hook vetoed one property.
    PropertySkipped {
        store: String,
        property: String,
        operation: OperationKind,
    },

    /// Reading, converting or writing one property failed.
    PropertyFailed {
        store: String,
        property: String,
        operation: OperationKind,
        error: String,
    },

    /// A bulk auto-persist run finished.
    AutoPersistCompleted {
        persisted: usize,
        skipped: usize,
        failed: usize,
    },

    /// This subscription was dropped.
    Dropped { reason: DropReason },
}

impl TrackingEvent {
    /// Store the event concerns, if any.
    pub fn store(&self) -> Option<&str> {
        match self {
            TrackingEvent::StateApplied { store, .. }
            | TrackingEvent::StatePersisted { store, .. }
            | TrackingEvent::PropertySkipped { store, .. }
            | TrackingEvent::PropertyFailed { store, .. } => Some(store),
            TrackingEvent::AutoPersistCompleted { .. } | TrackingEvent::Dropped { .. } => None,
        }
    }
}

/// Reason a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Subscriber couldn't keep up (buffer overflow).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to receive events.
pub struct EventHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<TrackingEvent>,
}

impl EventHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<TrackingEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<TrackingEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<TrackingEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<TrackingEvent> {
        self.receiver.try_iter().collect()
    }
}
