//! Per-object tracking state and the apply/persist cycles.

use super::naming::resolve_store_name;
use super::property::{AnyTarget, PropertyDescriptor};
use crate::error::{Result, TrackingError};
use crate::events::{EventBus, TrackingEvent};
use crate::listeners::ListenerSet;
use crate::storage::{Store, StoreFactory};
use crate::triggers::PersistTrigger;
use crate::types::{HookOutcome, ListenerId, NamingScheme, OperationKind, TargetType, Value};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Hook run for each property before it is applied or persisted.
///
/// Receives the property name and current value; returns the value to use
/// or a veto.
pub type PropertyHook = dyn Fn(&str, Value) -> HookOutcome + Send + Sync;

/// Notification fired after a completed cycle.
pub type CycleNotification = dyn Fn() + Send + Sync;

/// Store factory slot shared between a tracker and its configurations.
pub(crate) type FactorySlot = RwLock<Arc<dyn StoreFactory>>;

/// A property that could not be applied or persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyFailure {
    pub property: String,
    pub error: String,
}

/// Outcome of one apply or persist cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub store_name: String,
    pub operation: OperationKind,
    /// Properties written to the store (persist) or set from it (apply).
    pub completed: Vec<String>,
    /// Properties set to their default because the store had no value (apply only).
    pub defaulted: Vec<String>,
    /// Properties vetoed by a hook.
    pub vetoed: Vec<String>,
    pub failed: Vec<PropertyFailure>,
}

impl CycleReport {
    fn new(store_name: &str, operation: OperationKind) -> Self {
        Self {
            store_name: store_name.to_string(),
            operation,
            completed: Vec::new(),
            defaulted: Vec::new(),
            vetoed: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Properties that were vetoed or failed.
    pub fn skipped(&self) -> usize {
        self.vetoed.len() + self.failed.len()
    }
}

/// Mutable identity and property set.
struct ConfigState {
    key: Option<String>,
    naming_scheme: NamingScheme,
    properties: Vec<(String, PropertyDescriptor)>,
    auto_persist: bool,
    /// Copy of the resolved store name, readable without the store lock.
    store_name: Option<String>,
}

/// Store resolved on first apply/persist.
struct ResolvedStore {
    name: String,
    store: Box<dyn Store>,
}

/// Tracking state for one object.
///
/// Holds only a weak reference to its target: once the target is dropped,
/// [`apply`](Self::apply) and [`persist`](Self::persist) do nothing and
/// return `Ok(None)`.
///
/// Cycles on one configuration are serialized: the resolved store is
/// locked for the whole cycle, so a trigger-driven persist never
/// interleaves with a manual apply. Hooks must not start a cycle or change
/// the identity of the configuration invoking them; read accessors are fine.
pub struct TrackingConfiguration {
    target: Weak<AnyTarget>,
    target_type: TargetType,
    tracker_name: Option<String>,
    factory: Arc<FactorySlot>,
    events: Arc<EventBus>,
    state: RwLock<ConfigState>,
    store: Mutex<Option<ResolvedStore>>,
    applied: AtomicBool,
    applying: ListenerSet<PropertyHook>,
    persisting: ListenerSet<PropertyHook>,
    state_applied: ListenerSet<CycleNotification>,
    state_persisted: ListenerSet<CycleNotification>,
    /// Triggers this configuration subscribed to, released on drop.
    trigger_subscriptions: Mutex<Vec<(Weak<dyn PersistTrigger>, ListenerId)>>,
}

impl TrackingConfiguration {
    pub(crate) fn new(
        target: Weak<AnyTarget>,
        target_type: TargetType,
        tracker_name: Option<String>,
        factory: Arc<FactorySlot>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            target,
            target_type,
            tracker_name,
            factory,
            events,
            state: RwLock::new(ConfigState {
                key: None,
                naming_scheme: NamingScheme::default(),
                properties: Vec::new(),
                auto_persist: true,
                store_name: None,
            }),
            store: Mutex::new(None),
            applied: AtomicBool::new(false),
            applying: ListenerSet::new(),
            persisting: ListenerSet::new(),
            state_applied: ListenerSet::new(),
            state_persisted: ListenerSet::new(),
            trigger_subscriptions: Mutex::new(Vec::new()),
        }
    }

    // --- Target ---

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    /// The tracked object, if it is still alive.
    pub fn target(&self) -> Option<Arc<AnyTarget>> {
        self.target.upgrade()
    }

    /// The tracked object as its concrete type, if alive and a `T`.
    pub fn target_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target.upgrade()?.downcast::<T>().ok()
    }

    pub fn is_target_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Name of the tracker that created this configuration.
    pub fn tracker_name(&self) -> Option<&str> {
        self.tracker_name.as_deref()
    }

    // --- Identity ---

    pub fn key(&self) -> Option<String> {
        self.state.read().key.clone()
    }

    pub fn naming_scheme(&self) -> NamingScheme {
        self.state.read().naming_scheme
    }

    /// Set the key, keeping the naming scheme.
    ///
    /// Fails once the store has been resolved.
    pub fn set_key(&self, key: Option<String>) -> Result<&Self> {
        let slot = self.store.lock();
        ensure_unresolved(&slot)?;
        self.state.write().key = key;
        Ok(self)
    }

    /// Set key and naming scheme.
    ///
    /// Fails with [`TrackingError::InvalidOperation`] once the store has been
    /// resolved, which happens on the first apply or persist.
    pub fn identify_as(&self, key: impl Into<String>, scheme: NamingScheme) -> Result<&Self> {
        let slot = self.store.lock();
        ensure_unresolved(&slot)?;
        let mut state = self.state.write();
        state.key = Some(key.into());
        state.naming_scheme = scheme;
        Ok(self)
    }

    pub fn is_store_resolved(&self) -> bool {
        self.state.read().store_name.is_some()
    }

    /// Name of the resolved store, if resolved.
    pub fn store_name(&self) -> Option<String> {
        self.state.read().store_name.clone()
    }

    /// Store name that resolution would produce right now.
    pub fn expected_store_name(&self) -> Result<String> {
        let state = self.state.read();
        resolve_store_name(
            state.naming_scheme,
            &self.target_type.short_name(),
            state.key.as_deref(),
        )
    }

    // --- Tracked properties ---

    /// Track a property. Re-adding a name replaces its descriptor in place.
    ///
    /// Fails if the descriptor was built for a different type than the
    /// target's concrete type.
    pub fn add_property(
        &self,
        name: impl Into<String>,
        descriptor: PropertyDescriptor,
    ) -> Result<&Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TrackingError::InvalidArgument(
                "Property name must not be empty".into(),
            ));
        }
        if descriptor.target_type() != self.target_type {
            return Err(TrackingError::TypeMismatch {
                property: name,
                expected: descriptor.target_type().name,
                got: self.target_type.name,
            });
        }

        let mut state = self.state.write();
        match state.properties.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = descriptor,
            None => state.properties.push((name, descriptor)),
        }
        Ok(self)
    }

    /// Track a property through typed accessors.
    pub fn track<T, V, G, S>(&self, name: impl Into<String>, getter: G, setter: S) -> Result<&Self>
    where
        T: Any + Send + Sync,
        V: Serialize + DeserializeOwned,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        self.add_property(name, PropertyDescriptor::new(getter, setter))
    }

    /// Track a property with a default applied when the store has no value.
    pub fn track_with_default<T, V, G, S>(
        &self,
        name: impl Into<String>,
        default: V,
        getter: G,
        setter: S,
    ) -> Result<&Self>
    where
        T: Any + Send + Sync,
        V: Serialize + DeserializeOwned,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        self.add_property(name, PropertyDescriptor::new(getter, setter).with_default(default)?)
    }

    /// Stop tracking a property. Returns false if it was not tracked.
    pub fn remove_property(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let before = state.properties.len();
        state.properties.retain(|(existing, _)| existing != name);
        state.properties.len() != before
    }

    pub fn remove_properties(&self, names: &[&str]) -> &Self {
        let mut state = self.state.write();
        state
            .properties
            .retain(|(existing, _)| !names.contains(&existing.as_str()));
        self
    }

    /// Tracked property names in registration order.
    pub fn tracked_properties(&self) -> Vec<String> {
        self.state
            .read()
            .properties
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<PropertyDescriptor> {
        self.state
            .read()
            .properties
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, descriptor)| descriptor.clone())
    }

    // --- Auto-persist ---

    pub fn auto_persist_enabled(&self) -> bool {
        self.state.read().auto_persist
    }

    pub fn set_auto_persist_enabled(&self, enabled: bool) -> &Self {
        self.state.write().auto_persist = enabled;
        self
    }

    /// Whether [`apply`](Self::apply) has completed at least once.
    pub fn is_applied(&self) -> bool {
        self.applied.load(Ordering::SeqCst)
    }

    // --- Hooks and notifications ---

    pub fn on_applying<F>(&self, hook: F) -> ListenerId
    where
        F: Fn(&str, Value) -> HookOutcome + Send + Sync + 'static,
    {
        self.applying.add(Arc::new(hook))
    }

    pub fn on_persisting<F>(&self, hook: F) -> ListenerId
    where
        F: Fn(&str, Value) -> HookOutcome + Send + Sync + 'static,
    {
        self.persisting.add(Arc::new(hook))
    }

    pub fn on_state_applied<F>(&self, notification: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state_applied.add(Arc::new(notification))
    }

    pub fn on_state_persisted<F>(&self, notification: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state_persisted.add(Arc::new(notification))
    }

    /// Remove a hook or notification. Returns false if the id is unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.applying.remove(id)
            || self.persisting.remove(id)
            || self.state_applied.remove(id)
            || self.state_persisted.remove(id)
    }

    /// Persist whenever `trigger` fires, but only once state has been applied.
    ///
    /// Neither side keeps the other alive. The subscription is released
    /// when the configuration is dropped. Returns the trigger subscription id.
    pub fn register_persist_trigger(
        self: &Arc<Self>,
        trigger: Arc<dyn PersistTrigger>,
    ) -> ListenerId {
        let configuration = Arc::downgrade(self);
        let id = trigger.subscribe(Arc::new(move || {
            if let Some(configuration) = configuration.upgrade() {
                configuration.persist_if_applied();
            }
        }));
        self.trigger_subscriptions
            .lock()
            .push((Arc::downgrade(&trigger), id));
        id
    }

    /// Detach a trigger registered with
    /// [`register_persist_trigger`](Self::register_persist_trigger).
    pub fn unregister_persist_trigger(&self, id: ListenerId) -> bool {
        let mut subscriptions = self.trigger_subscriptions.lock();
        let Some(index) = subscriptions.iter().position(|(_, existing)| *existing == id) else {
            return false;
        };
        let (trigger, id) = subscriptions.remove(index);
        drop(subscriptions);
        trigger.upgrade().is_some_and(|trigger| trigger.unsubscribe(id))
    }

    fn persist_if_applied(&self) {
        if !self.is_applied() {
            debug!(target_type = %self.target_type, "Skipping triggered persist before first apply");
            return;
        }
        if let Err(e) = self.persist() {
            warn!(target_type = %self.target_type, error = %e, "Triggered persist failed");
        }
    }

    // --- Cycles ---

    /// Write current property values to the store and commit.
    ///
    /// Returns `Ok(None)` when the target is gone. Per-property failures and
    /// vetoes are reported in the returned [`CycleReport`] and on the event
    /// bus; only store resolution and commit failures return `Err`.
    pub fn persist(&self) -> Result<Option<CycleReport>> {
        let Some(target) = self.target.upgrade() else {
            debug!(target_type = %self.target_type, "Persist skipped, target dropped");
            return Ok(None);
        };

        let mut slot = self.store.lock();
        let resolved = self.resolved_store(&mut slot)?;

        // Properties removed since the last persist must not linger.
        resolved.store.clear();

        let properties = self.state.read().properties.clone();
        let hooks = self.persisting.snapshot();
        let mut report = CycleReport::new(&resolved.name, OperationKind::Persist);

        for (name, descriptor) in &properties {
            let value = match descriptor.read(&*target) {
                Ok(value) => value,
                Err(e) => {
                    self.report_failure(&mut report, name, e.to_string());
                    continue;
                }
            };

            let Some(value) = run_hooks(&hooks, name, value) else {
                self.report_veto(&mut report, name);
                continue;
            };

            match resolved.store.set(name, value) {
                Ok(()) => report.completed.push(name.clone()),
                Err(e) => self.report_failure(&mut report, name, e.to_string()),
            }
        }

        if let Err(e) = resolved.store.commit_changes() {
            warn!(store = %resolved.name, error = %e, "Commit failed");
            return Err(e);
        }
        drop(slot);

        debug!(
            store = %report.store_name,
            written = report.completed.len(),
            skipped = report.skipped(),
            "State persisted"
        );
        self.events.publish(TrackingEvent::StatePersisted {
            store: report.store_name.clone(),
            written: report.completed.len(),
            skipped: report.skipped(),
        });
        for notification in self.state_persisted.snapshot() {
            notification();
        }

        Ok(Some(report))
    }

    /// Set tracked properties from the store, falling back to defaults.
    ///
    /// Returns `Ok(None)` when the target is gone. Per-property failures and
    /// vetoes are isolated; only store resolution failure returns `Err`.
    pub fn apply(&self) -> Result<Option<CycleReport>> {
        let Some(target) = self.target.upgrade() else {
            debug!(target_type = %self.target_type, "Apply skipped, target dropped");
            return Ok(None);
        };

        let mut slot = self.store.lock();
        let resolved = self.resolved_store(&mut slot)?;

        let properties = self.state.read().properties.clone();
        let hooks = self.applying.snapshot();
        let mut report = CycleReport::new(&resolved.name, OperationKind::Apply);

        for (name, descriptor) in &properties {
            let stored = match resolved.store.contains_key(name) {
                Ok(true) => resolved.store.get(name).map(Some),
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            };

            match stored {
                Ok(Some(value)) => {
                    let Some(value) = run_hooks(&hooks, name, value) else {
                        self.report_veto(&mut report, name);
                        continue;
                    };
                    match descriptor.write(&*target, value) {
                        Ok(()) => report.completed.push(name.clone()),
                        Err(e) => self.report_failure(&mut report, name, e.to_string()),
                    }
                }
                Ok(None) => {
                    if let Some(default) = descriptor.default_value() {
                        match descriptor.write(&*target, default.clone()) {
                            Ok(()) => report.defaulted.push(name.clone()),
                            Err(e) => self.report_failure(&mut report, name, e.to_string()),
                        }
                    }
                }
                Err(e) => self.report_failure(&mut report, name, e.to_string()),
            }
        }
        drop(slot);

        self.applied.store(true, Ordering::SeqCst);

        debug!(
            store = %report.store_name,
            applied = report.completed.len(),
            defaulted = report.defaulted.len(),
            skipped = report.skipped(),
            "State applied"
        );
        self.events.publish(TrackingEvent::StateApplied {
            store: report.store_name.clone(),
            applied: report.completed.len(),
            defaulted: report.defaulted.len(),
            skipped: report.skipped(),
        });
        for notification in self.state_applied.snapshot() {
            notification();
        }

        Ok(Some(report))
    }

    // --- Internals ---

    /// Resolve the store on first use. The name is fixed from then on.
    fn resolved_store<'a>(
        &self,
        slot: &'a mut Option<ResolvedStore>,
    ) -> Result<&'a mut ResolvedStore> {
        if slot.is_none() {
            let name = self.expected_store_name()?;
            let store = self.factory.read().create_store_for_object(&name)?;
            debug!(store = %name, target_type = %self.target_type, "Store resolved");
            self.state.write().store_name = Some(name.clone());
            *slot = Some(ResolvedStore { name, store });
        }
        slot.as_mut()
            .ok_or_else(|| TrackingError::InvalidOperation("Store slot empty after resolution".into()))
    }

    fn report_veto(&self, report: &mut CycleReport, property: &str) {
        debug!(
            store = %report.store_name,
            property,
            operation = %report.operation,
            "Property cancelled by hook"
        );
        self.events.publish(TrackingEvent::PropertySkipped {
            store: report.store_name.clone(),
            property: property.to_string(),
            operation: report.operation,
        });
        report.vetoed.push(property.to_string());
    }

    fn report_failure(&self, report: &mut CycleReport, property: &str, error: String) {
        warn!(
            store = %report.store_name,
            property,
            operation = %report.operation,
            error = %error,
            "Property failed"
        );
        self.events.publish(TrackingEvent::PropertyFailed {
            store: report.store_name.clone(),
            property: property.to_string(),
            operation: report.operation,
            error: error.clone(),
        });
        report.failed.push(PropertyFailure {
            property: property.to_string(),
            error,
        });
    }
}

impl Drop for TrackingConfiguration {
    fn drop(&mut self) {
        for (trigger, id) in self.trigger_subscriptions.get_mut().drain(..) {
            if let Some(trigger) = trigger.upgrade() {
                trigger.unsubscribe(id);
            }
        }
    }
}

fn ensure_unresolved(slot: &Option<ResolvedStore>) -> Result<()> {
    match slot {
        Some(resolved) => Err(TrackingError::InvalidOperation(format!(
            "Can't change identity after store '{}' has been resolved",
            resolved.name
        ))),
        None => Ok(()),
    }
}

/// Run hooks in order. `None` means a hook vetoed.
fn run_hooks(hooks: &[Arc<PropertyHook>], property: &str, mut value: Value) -> Option<Value> {
    for hook in hooks {
        match hook(property, value) {
            HookOutcome::Proceed(next) => value = next,
            HookOutcome::Cancel => return None,
        }
    }
    Some(value)
}
