//! Sources of "persist now" signals.
//!
//! A [`PersistTrigger`] knows nothing about what gets persisted; it only
//! lets listeners subscribe to its signal. The tracker subscribes once for
//! bulk auto-persist, and configurations can subscribe individually with
//! [`TrackingConfiguration::register_persist_trigger`].
//!
//! [`TrackingConfiguration::register_persist_trigger`]: crate::TrackingConfiguration::register_persist_trigger

mod interval;
mod manual;

pub use interval::IntervalTrigger;
pub use manual::ManualTrigger;

use crate::types::ListenerId;
use std::sync::Arc;

/// Callback invoked when persistence is required. No payload.
pub type PersistListener = Arc<dyn Fn() + Send + Sync>;

/// Subscribe/unsubscribe point for a "persist required" signal.
pub trait PersistTrigger: Send + Sync {
    fn subscribe(&self, listener: PersistListener) -> ListenerId;

    /// Detach a listener. Returns false if it was not subscribed.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}
