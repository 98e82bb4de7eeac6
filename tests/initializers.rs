//! Initializer selection and metadata-driven setup.

use parking_lot::Mutex;
use serde_json::json;
use state_tracker::{
    ConfigurationInitializer, MemoryStoreFactory, NamingScheme, PropertyDescriptor,
    StateTracker, StoreValues, TrackerConfig, TrackingConfiguration, TrackingError, TypeMetadata,
};
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Window {
    id: String,
    width: Mutex<u32>,
    height: Mutex<u32>,
}

#[derive(Default)]
struct Dialog {
    width: Mutex<u32>,
}

#[derive(Default)]
struct SettingsDialog {
    width: Mutex<u32>,
}

fn window(id: &str) -> Arc<Window> {
    Arc::new(Window {
        id: id.to_string(),
        ..Default::default()
    })
}

fn width_descriptor() -> PropertyDescriptor {
    PropertyDescriptor::new(
        |w: &Window| *w.width.lock(),
        |w: &Window, v: u32| *w.width.lock() = v,
    )
}

fn height_descriptor() -> PropertyDescriptor {
    PropertyDescriptor::new(
        |w: &Window| *w.height.lock(),
        |w: &Window, v: u32| *w.height.lock() = v,
    )
}

/// Initializer that records how often it ran and tracks nothing else.
struct Counting {
    ty: TypeId,
    runs: AtomicUsize,
}

impl Counting {
    fn new<T: 'static>() -> Arc<Self> {
        Arc::new(Self {
            ty: TypeId::of::<T>(),
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl ConfigurationInitializer for Counting {
    fn for_type(&self) -> Option<TypeId> {
        Some(self.ty)
    }

    fn initialize_configuration(
        &self,
        _configuration: &TrackingConfiguration,
    ) -> state_tracker::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Failing;

impl ConfigurationInitializer for Failing {
    fn for_type(&self) -> Option<TypeId> {
        Some(TypeId::of::<Dialog>())
    }

    fn initialize_configuration(
        &self,
        _configuration: &TrackingConfiguration,
    ) -> state_tracker::Result<()> {
        Err(TrackingError::InvalidOperation("not today".into()))
    }
}

#[test]
fn test_metadata_key_and_properties() {
    let factory = MemoryStoreFactory::new();
    let mut seeded = StoreValues::new();
    seeded.insert("width".into(), json!(1024));
    factory.seed("Window_main", seeded);

    let tracker = StateTracker::new(factory);
    tracker.describe(
        TypeMetadata::<Window>::new()
            .key(|w| w.id.clone())
            .property("width", width_descriptor())
            .property("height", height_descriptor().with_default(600u32).unwrap()),
    );

    let target = window("main");
    let configuration = tracker.configure(&target).unwrap();
    assert_eq!(configuration.key().as_deref(), Some("main"));
    assert_eq!(configuration.tracked_properties(), vec!["width", "height"]);

    let report = configuration.apply().unwrap().unwrap();

    assert_eq!(report.store_name, "Window_main");
    assert_eq!(report.completed, vec!["width"]);
    assert_eq!(report.defaulted, vec!["height"]);
    assert_eq!(*target.width.lock(), 1024);
    assert_eq!(*target.height.lock(), 600);
}

#[test]
fn test_properties_scoped_to_tracker_name() {
    let metadata = || {
        TypeMetadata::<Window>::new()
            .property("width", width_descriptor())
            .property_for("layout", "height", height_descriptor())
    };

    let unnamed = StateTracker::new(MemoryStoreFactory::new());
    unnamed.describe(metadata());

    let named = StateTracker::with_config(
        TrackerConfig {
            name: Some("layout".into()),
            ..Default::default()
        },
        Arc::new(MemoryStoreFactory::new()),
    );
    named.describe(metadata());

    let target = window("w");
    assert_eq!(
        unnamed.configure(&target).unwrap().tracked_properties(),
        vec!["width"]
    );
    assert_eq!(
        named.configure(&target).unwrap().tracked_properties(),
        vec!["height"]
    );
}

#[test]
fn test_post_init_can_change_identity() {
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    tracker.describe(TypeMetadata::<Window>::new().post_init(|w, configuration| {
        configuration.identify_as(format!("{}-layout", w.id), NamingScheme::KeyOnly)?;
        Ok(())
    }));

    let target = window("main");
    let configuration = tracker.configure(&target).unwrap();

    assert_eq!(configuration.expected_store_name().unwrap(), "main-layout");
}

#[test]
fn test_registered_initializer_replaces_metadata() {
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    tracker.describe(TypeMetadata::<Window>::new().property("width", width_descriptor()));
    let counting = Counting::new::<Window>();
    tracker.register_initializer(counting.clone());

    let target = window("main");
    let configuration = tracker.configure(&target).unwrap();
    tracker.configure(&target).unwrap();

    assert_eq!(counting.runs(), 1);
    assert!(configuration.tracked_properties().is_empty());
}

#[test]
fn test_supertype_initializer_used_for_subtype() {
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    let dialog_init = Counting::new::<Dialog>();
    tracker.register_initializer(dialog_init.clone());
    tracker.declare_supertype::<SettingsDialog, Dialog>();

    tracker.configure(&Arc::new(SettingsDialog::default())).unwrap();
    assert_eq!(dialog_init.runs(), 1);

    // A more specific registration takes over.
    let settings_init = Counting::new::<SettingsDialog>();
    tracker.register_initializer(settings_init.clone());
    tracker.configure(&Arc::new(SettingsDialog::default())).unwrap();

    assert_eq!(dialog_init.runs(), 1);
    assert_eq!(settings_init.runs(), 1);
}

#[test]
fn test_undescribed_type_gets_empty_configuration() {
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    let target = Arc::new(Dialog::default());

    let configuration = tracker.configure(&target).unwrap();

    assert!(configuration.tracked_properties().is_empty());
    assert_eq!(configuration.expected_store_name().unwrap(), "Dialog");
    assert_eq!(*target.width.lock(), 0);
}

#[test]
fn test_failing_initializer_registers_nothing() {
    let tracker = StateTracker::new(MemoryStoreFactory::new());
    tracker.register_initializer(Arc::new(Failing));
    let target = Arc::new(Dialog::default());

    let result = tracker.configure(&target);

    assert!(matches!(result, Err(TrackingError::InvalidOperation(_))));
    assert!(tracker.find_configuration(&target).is_none());
    assert_eq!(tracker.tracked_count(), 0);
}
