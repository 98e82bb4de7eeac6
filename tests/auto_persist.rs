//! Auto-persist triggers and bulk persistence.

use parking_lot::Mutex;
use serde_json::{json, Value};
use state_tracker::{
    EventFilter, EventSubscriptionConfig, IntervalTrigger, ManualTrigger, MemoryStoreFactory,
    StateTracker, Store, TrackingConfiguration, TrackingError, TrackingEvent,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Healthy {
    value: Mutex<i64>,
}

#[derive(Default)]
struct Broken {
    value: Mutex<i64>,
}

fn track_healthy(configuration: &TrackingConfiguration) {
    configuration
        .track(
            "value",
            |t: &Healthy| *t.value.lock(),
            |t: &Healthy, v: i64| *t.value.lock() = v,
        )
        .unwrap();
}

fn track_broken(configuration: &TrackingConfiguration) {
    configuration
        .track(
            "value",
            |t: &Broken| *t.value.lock(),
            |t: &Broken, v: i64| *t.value.lock() = v,
        )
        .unwrap();
}

/// Store whose commits always fail.
struct FailingStore;

impl Store for FailingStore {
    fn contains_key(&mut self, _name: &str) -> state_tracker::Result<bool> {
        Ok(false)
    }

    fn get(&mut self, name: &str) -> state_tracker::Result<Value> {
        Err(TrackingError::KeyNotFound(name.to_string()))
    }

    fn set(&mut self, _name: &str, _value: Value) -> state_tracker::Result<()> {
        Ok(())
    }

    fn commit_changes(&mut self) -> state_tracker::Result<()> {
        Err(TrackingError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn clear(&mut self) {}
}

fn tracker_with_broken_store(memory: &MemoryStoreFactory) -> StateTracker {
    let memory = memory.clone();
    StateTracker::new(
        move |name: &str| -> state_tracker::Result<Box<dyn Store>> {
            if name == "Broken" {
                Ok(Box::new(FailingStore))
            } else {
                Ok(Box::new(memory.open(name)))
            }
        },
    )
}

#[test]
fn test_trigger_persists_only_applied_configurations() {
    let factory = MemoryStoreFactory::new();
    let tracker = StateTracker::new(factory.clone());
    let trigger = Arc::new(ManualTrigger::new());
    tracker.set_auto_persist_trigger(trigger.clone());

    let target = Arc::new(Healthy::default());
    let configuration = tracker.configure(&target).unwrap();
    track_healthy(&configuration);
    *target.value.lock() = 5;

    // Never applied: persisting now would overwrite stored state with
    // whatever the object happens to hold.
    trigger.fire();
    assert!(factory.committed("Healthy").is_none());

    configuration.apply().unwrap();
    *target.value.lock() = 6;
    trigger.fire();

    assert_eq!(factory.committed("Healthy").unwrap()["value"], json!(6));
}

#[test]
fn test_disabled_auto_persist_is_skipped() {
    let factory = MemoryStoreFactory::new();
    let tracker = StateTracker::new(factory.clone());

    let target = Arc::new(Healthy::default());
    let configuration = tracker.configure(&target).unwrap();
    track_healthy(&configuration);
    configuration.apply().unwrap();
    configuration.set_auto_persist_enabled(false);

    let report = tracker.run_auto_persist();

    assert!(report.persisted.is_empty());
    assert_eq!(report.skipped, 1);
    assert!(factory.committed("Healthy").is_none());

    // Manual persist still works.
    configuration.persist().unwrap();
    assert!(factory.committed("Healthy").is_some());
}

#[test]
fn test_bulk_failure_does_not_stop_others() {
    let factory = MemoryStoreFactory::new();
    let tracker = tracker_with_broken_store(&factory);

    let broken = Arc::new(Broken::default());
    let healthy = Arc::new(Healthy::default());

    let c1 = tracker.configure(&broken).unwrap();
    track_broken(&c1);
    c1.apply().unwrap();

    let c2 = tracker.configure(&healthy).unwrap();
    track_healthy(&c2);
    c2.apply().unwrap();
    *healthy.value.lock() = 11;

    let report = tracker.run_auto_persist();

    assert_eq!(report.persisted, vec!["Healthy"]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].target_type.ends_with("Broken"));
    assert!(report.failed[0].error.contains("disk full"));
    assert_eq!(factory.committed("Healthy").unwrap()["value"], json!(11));
}

#[test]
fn test_commit_failure_is_returned_from_persist() {
    let tracker = tracker_with_broken_store(&MemoryStoreFactory::new());
    let broken = Arc::new(Broken::default());
    let configuration = tracker.configure(&broken).unwrap();
    track_broken(&configuration);

    assert!(matches!(configuration.persist(), Err(TrackingError::Io(_))));
}

#[test]
fn test_dropped_targets_are_not_persisted() {
    let factory = MemoryStoreFactory::new();
    let tracker = StateTracker::new(factory.clone());

    let target = Arc::new(Healthy::default());
    let configuration = tracker.configure(&target).unwrap();
    track_healthy(&configuration);
    configuration.apply().unwrap();
    drop(configuration);
    drop(target);

    let report = tracker.run_auto_persist();

    assert!(report.persisted.is_empty());
    assert!(report.failed.is_empty());
    assert!(factory.committed("Healthy").is_none());
}

#[test]
fn test_per_configuration_trigger() {
    let factory = MemoryStoreFactory::new();
    let tracker = StateTracker::new(factory.clone());
    let trigger = Arc::new(ManualTrigger::new());

    let target = Arc::new(Healthy::default());
    let configuration = tracker.configure(&target).unwrap();
    track_healthy(&configuration);
    let id = configuration.register_persist_trigger(trigger.clone());

    trigger.fire();
    assert!(factory.committed("Healthy").is_none());

    configuration.apply().unwrap();
    *target.value.lock() = 3;
    trigger.fire();
    assert_eq!(factory.committed("Healthy").unwrap()["value"], json!(3));

    assert!(configuration.unregister_persist_trigger(id));
    assert!(!configuration.unregister_persist_trigger(id));
    assert_eq!(trigger.subscriber_count(), 0);
    *target.value.lock() = 4;
    trigger.fire();
    assert_eq!(factory.committed("Healthy").unwrap()["value"], json!(3));
}

#[test]
fn test_dropped_configuration_leaves_trigger() {
    let trigger = Arc::new(ManualTrigger::new());
    let kept = Arc::new(Healthy::default());
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    {
        let target = Arc::new(Healthy::default());
        let configuration = tracker.configure(&target).unwrap();
        configuration.register_persist_trigger(trigger.clone());
        assert_eq!(trigger.subscriber_count(), 1);
    }

    // The registry releases the dead target's configuration on its next sweep.
    tracker.configure(&kept).unwrap();

    assert_eq!(trigger.subscriber_count(), 0);
}

#[test]
fn test_auto_persist_publishes_summary_event() {
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    let handle = tracker.events().subscribe(EventSubscriptionConfig {
        filter: EventFilter {
            include_cycles: false,
            include_properties: false,
            ..EventFilter::all()
        },
        ..Default::default()
    });

    let target = Arc::new(Healthy::default());
    let configuration = tracker.configure(&target).unwrap();
    track_healthy(&configuration);
    configuration.apply().unwrap();

    tracker.run_auto_persist();

    let events = handle.drain();
    assert_eq!(
        events,
        vec![TrackingEvent::AutoPersistCompleted {
            persisted: 1,
            skipped: 0,
            failed: 0,
        }]
    );
}

#[test]
fn test_interval_trigger_drives_auto_persist() {
    let factory = MemoryStoreFactory::new();
    let tracker = StateTracker::new(factory.clone());
    let handle = tracker.events().subscribe(EventSubscriptionConfig {
        filter: EventFilter {
            include_cycles: false,
            include_properties: false,
            ..EventFilter::all()
        },
        ..Default::default()
    });

    let target = Arc::new(Healthy::default());
    let configuration = tracker.configure(&target).unwrap();
    track_healthy(&configuration);
    configuration.apply().unwrap();
    *target.value.lock() = 21;

    let trigger = Arc::new(IntervalTrigger::start(Duration::from_millis(10)).unwrap());
    tracker.set_auto_persist_trigger(trigger);

    let event = handle.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(event, TrackingEvent::AutoPersistCompleted { .. }));
    assert_eq!(factory.committed("Healthy").unwrap()["value"], json!(21));

    tracker.clear_auto_persist_trigger();
}
