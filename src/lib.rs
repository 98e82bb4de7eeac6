//! # State Tracker
//!
//! Persist selected properties of live objects to pluggable key/value
//! stores and restore them on the next run.
//!
//! ## Core Concepts
//!
//! - **Tracker**: weak registry from objects to their tracking configuration
//! - **Configuration**: tracked properties, store identity, apply/persist cycles
//! - **Stores**: key/value units, one per tracked object, created by a factory
//! - **Triggers**: "persist now" signals, e.g. application exit or a timer
//!
//! ## Example
//!
//! ```ignore
//! use state_tracker::{MemoryStoreFactory, NamingScheme, StateTracker};
//!
//! let tracker = StateTracker::new(MemoryStoreFactory::new());
//! let window = Arc::new(Window::default());
//!
//! tracker
//!     .configure(&window)?
//!     .identify_as("main", NamingScheme::TypeNameAndKey)?
//!     .track_with_default(
//!         "width",
//!         800u32,
//!         |w: &Window| *w.width.lock(),
//!         |w: &Window, v: u32| *w.width.lock() = v,
//!     )?
//!     .apply()?;
//!
//! // Later, e.g. on exit
//! tracker.configure(&window)?.persist()?;
//! ```

pub mod error;
pub mod events;
pub mod listeners;
pub mod storage;
pub mod tracker;
pub mod tracking;
pub mod triggers;
pub mod types;

// Re-exports
pub use error::{PropertyError, Result, TrackingError};
pub use events::{
    DropReason, EventBus, EventFilter, EventHandle, EventSubscriptionConfig, SubscriptionId,
    TrackingEvent,
};
pub use listeners::ListenerSet;
pub use storage::{
    FileBackend, FileStore, FileStoreConfig, FileStoreFactory, MemoryBackend, MemoryStore,
    MemoryStoreFactory, PersistentStore, Store, StoreBackend, StoreEncoding, StoreFactory,
    StoreValues,
};
pub use tracker::{
    AutoPersistFailure, AutoPersistReport, ConfigurationInitializer, MetadataInitializer,
    StateTracker, TrackerConfig, TypeMetadata,
};
pub use tracking::{
    resolve_store_name, AnyTarget, CycleNotification, CycleReport, PropertyDescriptor,
    PropertyFailure, PropertyHook, PropertyResult, TrackingConfiguration,
};
pub use triggers::{IntervalTrigger, ManualTrigger, PersistListener, PersistTrigger};
pub use types::*;
