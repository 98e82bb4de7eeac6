//! Non-owning association from tracked objects to their configurations.

use crate::tracking::{AnyTarget, TrackingConfiguration};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Identity of a tracked object: the address of its `Arc` allocation.
///
/// An entry keeps a `Weak` to the allocation, and an allocation is not
/// freed while a `Weak` to it exists, so an address can't be reused by a
/// different object while its entry is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ObjectId(usize);

impl ObjectId {
    pub(crate) fn of(target: &Arc<AnyTarget>) -> Self {
        ObjectId(Arc::as_ptr(target) as *const () as usize)
    }
}

struct Entry {
    target: Weak<AnyTarget>,
    configuration: Arc<TrackingConfiguration>,
}

/// Weak-keyed side table plus the list of handles used for bulk iteration.
///
/// A `Weak` keeps its target's allocation (not the value) alive, so entries
/// and handles of dropped targets are swept whenever a new entry is
/// inserted. Between sweeps, dead handles are skipped when iterating.
pub(crate) struct ConfigurationRegistry {
    entries: RwLock<HashMap<ObjectId, Entry>>,
    handles: RwLock<Vec<Weak<AnyTarget>>>,
}

impl ConfigurationRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            handles: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn find(&self, target: &Arc<AnyTarget>) -> Option<Arc<TrackingConfiguration>> {
        self.entries
            .read()
            .get(&ObjectId::of(target))
            .filter(|entry| entry.target.strong_count() > 0)
            .map(|entry| Arc::clone(&entry.configuration))
    }

    /// Insert unless another configuration was registered for the same
    /// object in the meantime; returns whichever configuration is registered.
    pub(crate) fn insert(
        &self,
        target: &Arc<AnyTarget>,
        configuration: Arc<TrackingConfiguration>,
    ) -> Arc<TrackingConfiguration> {
        let id = ObjectId::of(target);
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(&id) {
            if existing.target.strong_count() > 0 {
                return Arc::clone(&existing.configuration);
            }
        }

        entries.retain(|_, entry| entry.target.strong_count() > 0);
        entries.insert(
            id,
            Entry {
                target: Arc::downgrade(target),
                configuration: Arc::clone(&configuration),
            },
        );
        drop(entries);

        let mut handles = self.handles.write();
        handles.retain(|handle| handle.strong_count() > 0);
        handles.push(Arc::downgrade(target));
        configuration
    }

    /// Live targets with their configurations, in registration order.
    pub(crate) fn live(&self) -> Vec<(Arc<AnyTarget>, Arc<TrackingConfiguration>)> {
        let handles: Vec<Weak<AnyTarget>> = self.handles.read().clone();
        handles
            .iter()
            .filter_map(Weak::upgrade)
            .filter_map(|target| {
                let configuration = self.find(&target)?;
                Some((target, configuration))
            })
            .collect()
    }

    /// Number of recorded handles, including dead ones not yet swept.
    pub(crate) fn handle_count(&self) -> usize {
        self.handles.read().len()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.target.strong_count() > 0)
            .count()
    }
}
