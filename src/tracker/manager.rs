//! The process-wide tracker.

use super::initializer::{ConfigurationInitializer, InitializerSet};
use super::metadata::{MetadataInitializer, TypeMetadata};
use super::registry::ConfigurationRegistry;
use crate::error::{Result, TrackingError};
use crate::events::{EventBus, TrackingEvent};
use crate::storage::StoreFactory;
use crate::tracking::{AnyTarget, FactorySlot, TrackingConfiguration};
use crate::triggers::PersistTrigger;
use crate::types::{ListenerId, TargetType};
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Tracker configuration.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Tracker name. Metadata properties declared for a named tracker are
    /// only picked up by the tracker with that name.
    pub name: Option<String>,

    /// Buffer size for event subscriptions that don't set one.
    pub event_buffer_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: None,
            event_buffer_size: 1000,
        }
    }
}

/// A configuration whose persist failed during a bulk run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoPersistFailure {
    pub target_type: &'static str,
    pub error: String,
}

/// Outcome of [`StateTracker::run_auto_persist`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutoPersistReport {
    /// Store names persisted.
    pub persisted: Vec<String>,
    /// Configurations skipped: auto-persist disabled or never applied.
    pub skipped: usize,
    pub failed: Vec<AutoPersistFailure>,
}

/// Current auto-persist trigger and our subscription to it.
struct TriggerBinding {
    trigger: Arc<dyn PersistTrigger>,
    listener: ListenerId,
}

struct TrackerInner {
    config: TrackerConfig,
    registry: ConfigurationRegistry,
    initializers: RwLock<InitializerSet>,
    metadata: Arc<MetadataInitializer>,
    factory: Arc<FactorySlot>,
    events: Arc<EventBus>,
    trigger: Mutex<Option<TriggerBinding>>,
}

/// Registry of tracked objects and their configurations.
///
/// Holds tracked objects weakly: configuring an object never keeps it
/// alive. Cloning the tracker yields another handle to the same registry.
///
/// `configure` is safe to call concurrently for different objects. Two
/// concurrent first calls for the same object may both run the initializer;
/// only one configuration is kept and returned to both.
#[derive(Clone)]
pub struct StateTracker {
    inner: Arc<TrackerInner>,
}

impl StateTracker {
    /// Tracker with default configuration.
    pub fn new(factory: impl StoreFactory + 'static) -> Self {
        Self::with_config(TrackerConfig::default(), Arc::new(factory))
    }

    pub fn with_config(config: TrackerConfig, factory: Arc<dyn StoreFactory>) -> Self {
        let metadata = Arc::new(MetadataInitializer::new());
        let default: Arc<dyn ConfigurationInitializer> = metadata.clone();

        Self {
            inner: Arc::new(TrackerInner {
                events: Arc::new(EventBus::with_default_buffer(config.event_buffer_size)),
                config,
                registry: ConfigurationRegistry::new(),
                initializers: RwLock::new(InitializerSet::new(default)),
                metadata,
                factory: Arc::new(RwLock::new(factory)),
                trigger: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.config.name.as_deref()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // --- Stores ---

    pub fn store_factory(&self) -> Arc<dyn StoreFactory> {
        Arc::clone(&self.inner.factory.read())
    }

    /// Replace the store factory. Configurations whose store is already
    /// resolved keep their store.
    pub fn set_store_factory(&self, factory: Arc<dyn StoreFactory>) {
        *self.inner.factory.write() = factory;
    }

    // --- Initializers ---

    /// Register an initializer for its type. Last registration wins.
    pub fn register_initializer(&self, initializer: Arc<dyn ConfigurationInitializer>) {
        self.inner.initializers.write().register(initializer);
    }

    /// Declare `Parent` as the supertype of `Child` for initializer lookup.
    pub fn declare_supertype<Child: Any, Parent: Any>(&self) {
        self.inner
            .initializers
            .write()
            .declare_supertype(TypeId::of::<Child>(), TypeId::of::<Parent>());
    }

    /// Describe how the built-in initializer tracks values of type `T`.
    pub fn describe<T: Any + Send + Sync>(&self, metadata: TypeMetadata<T>) {
        self.inner.metadata.register(metadata);
    }

    // --- Configurations ---

    /// Find or create the configuration for `target`.
    ///
    /// On first call for an object the matching initializer runs; later
    /// calls return the same configuration without re-running it. An
    /// initializer error is returned and nothing is registered.
    pub fn configure<T: Any + Send + Sync>(
        &self,
        target: &Arc<T>,
    ) -> Result<Arc<TrackingConfiguration>> {
        let erased: Arc<AnyTarget> = target.clone();
        self.configure_erased(&erased, TargetType::of::<T>())
    }

    /// Like [`configure`](Self::configure) for a weak handle. Fails with
    /// [`TrackingError::InvalidArgument`] if the target is gone.
    pub fn configure_weak<T: Any + Send + Sync>(
        &self,
        target: &Weak<T>,
    ) -> Result<Arc<TrackingConfiguration>> {
        let target = target.upgrade().ok_or_else(|| {
            TrackingError::InvalidArgument(format!(
                "Target of type {} is absent",
                std::any::type_name::<T>()
            ))
        })?;
        self.configure(&target)
    }

    /// Existing configuration for `target`, without creating one.
    pub fn find_configuration<T: Any + Send + Sync>(
        &self,
        target: &Arc<T>,
    ) -> Option<Arc<TrackingConfiguration>> {
        let erased: Arc<AnyTarget> = target.clone();
        self.inner.registry.find(&erased)
    }

    /// Number of tracked objects still alive.
    pub fn tracked_count(&self) -> usize {
        self.inner.registry.live_count()
    }

    fn configure_erased(
        &self,
        target: &Arc<AnyTarget>,
        target_type: TargetType,
    ) -> Result<Arc<TrackingConfiguration>> {
        if let Some(existing) = self.inner.registry.find(target) {
            return Ok(existing);
        }

        let configuration = Arc::new(TrackingConfiguration::new(
            Arc::downgrade(target),
            target_type,
            self.inner.config.name.clone(),
            Arc::clone(&self.inner.factory),
            Arc::clone(&self.inner.events),
        ));

        let initializer = self.inner.initializers.read().find(target_type.id);
        if let Some(initializer) = initializer {
            initializer.initialize_configuration(&configuration)?;
        }

        debug!(
            target_type = %target_type,
            properties = configuration.tracked_properties().len(),
            "Configuration created"
        );
        Ok(self.inner.registry.insert(target, configuration))
    }

    // --- Auto-persist ---

    /// Replace the auto-persist trigger, detaching from the previous one first.
    pub fn set_auto_persist_trigger(&self, trigger: Arc<dyn PersistTrigger>) {
        let mut binding = self.inner.trigger.lock();
        if let Some(previous) = binding.take() {
            previous.trigger.unsubscribe(previous.listener);
            debug!("Previous auto-persist trigger detached");
        }

        let tracker = Arc::downgrade(&self.inner);
        let listener = trigger.subscribe(Arc::new(move || {
            if let Some(tracker) = tracker.upgrade() {
                tracker.run_auto_persist();
            }
        }));
        *binding = Some(TriggerBinding { trigger, listener });
    }

    /// Detach and return the current auto-persist trigger.
    pub fn clear_auto_persist_trigger(&self) -> Option<Arc<dyn PersistTrigger>> {
        let previous = self.inner.trigger.lock().take()?;
        previous.trigger.unsubscribe(previous.listener);
        Some(previous.trigger)
    }

    pub fn has_auto_persist_trigger(&self) -> bool {
        self.inner.trigger.lock().is_some()
    }

    /// Persist every live configuration with auto-persist enabled that has
    /// been applied at least once. A failure on one does not stop the rest.
    pub fn run_auto_persist(&self) -> AutoPersistReport {
        self.inner.run_auto_persist()
    }
}

impl TrackerInner {
    fn run_auto_persist(&self) -> AutoPersistReport {
        let mut report = AutoPersistReport::default();

        for (_target, configuration) in self.registry.live() {
            if !configuration.auto_persist_enabled() || !configuration.is_applied() {
                report.skipped += 1;
                continue;
            }

            match configuration.persist() {
                Ok(Some(cycle)) => report.persisted.push(cycle.store_name),
                // Dropped between listing and persisting
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        target_type = %configuration.target_type(),
                        error = %e,
                        "Auto-persist failed"
                    );
                    report.failed.push(AutoPersistFailure {
                        target_type: configuration.target_type().name,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            persisted = report.persisted.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "Auto-persist completed"
        );
        self.events.publish(TrackingEvent::AutoPersistCompleted {
            persisted: report.persisted.len(),
            skipped: report.skipped,
            failed: report.failed.len(),
        });
        report
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        if let Some(binding) = self.trigger.get_mut().take() {
            binding.trigger.unsubscribe(binding.listener);
        }
    }
}
