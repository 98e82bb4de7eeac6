//! Process-wide registry of tracked objects.
//!
//! The [`StateTracker`] maps each tracked object to exactly one
//! [`TrackingConfiguration`](crate::TrackingConfiguration) without keeping
//! the object alive, picks an initializer for new configurations, and fans
//! a trigger's "persist required" signal out to every eligible
//! configuration.

mod initializer;
mod manager;
mod metadata;
mod registry;

pub use initializer::ConfigurationInitializer;
pub use manager::{AutoPersistFailure, AutoPersistReport, StateTracker, TrackerConfig};
pub use metadata::{MetadataInitializer, TypeMetadata};
