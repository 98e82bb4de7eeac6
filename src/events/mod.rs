//! Observability channel for tracking activity.
//!
//! Every configuration created by a tracker reports to the tracker's
//! [`EventBus`]: completed cycles, vetoed or failed properties, and bulk
//! auto-persist runs. Subscribers receive events over bounded channels and
//! are dropped if they fall behind.
//!
//! # Example
//!
//! ```ignore
//! let handle = tracker.events().subscribe(EventSubscriptionConfig {
//!     filter: EventFilter::failures(),
//!     ..Default::default()
//! });
//!
//! while let Ok(event) = handle.recv() {
//!     if let TrackingEvent::PropertyFailed { property, error, .. } = event {
//!         eprintln!("{property}: {error}");
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::EventBus;
pub use types::{
    DropReason, EventFilter, EventHandle, EventSubscriptionConfig, SubscriptionId, TrackingEvent,
};
