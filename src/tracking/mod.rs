//! Per-object tracking configuration.
//!
//! A [`TrackingConfiguration`] owns the tracked-property set of one object,
//! resolves that object's store on first use and runs the two cycles:
//!
//! - **persist**: clear the store buffer, read every property, run the
//!   persisting hooks, write, commit
//! - **apply**: read every stored property, run the applying hooks, set it
//!   on the target; properties missing from the store get their default
//!
//! A failing or vetoed property never stops the rest of the cycle.

mod configuration;
mod naming;
mod property;

pub use configuration::{
    CycleNotification, CycleReport, PropertyFailure, PropertyHook, TrackingConfiguration,
};
pub(crate) use configuration::FactorySlot;
pub use naming::resolve_store_name;
pub use property::{AnyTarget, PropertyDescriptor, PropertyResult};
