//! Property-based tests for store naming and apply/persist cycles.

use parking_lot::Mutex;
use proptest::prelude::*;
use state_tracker::{
    resolve_store_name, HookOutcome, MemoryStoreFactory, NamingScheme, StateTracker,
};
use std::sync::Arc;

#[derive(Default)]
struct Sample {
    number: Mutex<i64>,
    label: Mutex<String>,
    flags: Mutex<Vec<bool>>,
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9]{1,12}").expect("Valid regex")
}

proptest! {
    #[test]
    fn key_only_name_is_key(key in key_strategy()) {
        let name = resolve_store_name(NamingScheme::KeyOnly, "Sample", Some(&key)).unwrap();
        prop_assert_eq!(name, key);
    }

    #[test]
    fn type_and_key_names_are_distinct_per_key(a in key_strategy(), b in key_strategy()) {
        let first = resolve_store_name(NamingScheme::TypeNameAndKey, "Sample", Some(&a)).unwrap();
        let second = resolve_store_name(NamingScheme::TypeNameAndKey, "Sample", Some(&b)).unwrap();
        prop_assert!(first.starts_with("Sample_"));
        prop_assert_eq!(first == second, a == b);
    }

    #[test]
    fn persisted_values_are_restored(
        number in any::<i64>(),
        label in ".{0,32}",
        flags in prop::collection::vec(any::<bool>(), 0..8),
    ) {
        let factory = MemoryStoreFactory::new();

        let original = Arc::new(Sample::default());
        *original.number.lock() = number;
        *original.label.lock() = label.clone();
        *original.flags.lock() = flags.clone();

        let restored = Arc::new(Sample::default());

        for target in [&original, &restored] {
            let tracker = StateTracker::new(factory.clone());
            let configuration = tracker.configure(target).unwrap();
            configuration
                .track("number", |s: &Sample| *s.number.lock(), |s: &Sample, v: i64| *s.number.lock() = v)
                .unwrap()
                .track("label", |s: &Sample| s.label.lock().clone(), |s: &Sample, v: String| *s.label.lock() = v)
                .unwrap()
                .track("flags", |s: &Sample| s.flags.lock().clone(), |s: &Sample, v: Vec<bool>| *s.flags.lock() = v)
                .unwrap();

            if Arc::ptr_eq(target, &original) {
                configuration.persist().unwrap();
            } else {
                configuration.apply().unwrap();
            }
        }

        prop_assert_eq!(*restored.number.lock(), number);
        prop_assert_eq!(&*restored.label.lock(), &label);
        prop_assert_eq!(&*restored.flags.lock(), &flags);
    }

    #[test]
    fn hooks_compose_in_registration_order(start in -1000i64..1000, offsets in prop::collection::vec(-50i64..50, 0..6)) {
        let factory = MemoryStoreFactory::new();
        let tracker = StateTracker::new(factory.clone());
        let sample = Arc::new(Sample::default());
        *sample.number.lock() = start;

        let configuration = tracker.configure(&sample).unwrap();
        configuration
            .track("number", |s: &Sample| *s.number.lock(), |s: &Sample, v: i64| *s.number.lock() = v)
            .unwrap();

        // Each hook doubles then adds its offset, so order matters.
        for offset in offsets.clone() {
            configuration.on_persisting(move |_, value| {
                let n = value.as_i64().unwrap_or_default();
                HookOutcome::Proceed((n * 2 + offset).into())
            });
        }

        configuration.persist().unwrap();

        let expected = offsets.iter().fold(start, |n, offset| n * 2 + offset);
        prop_assert_eq!(factory.committed("Sample").unwrap()["number"].as_i64(), Some(expected));
    }
}
