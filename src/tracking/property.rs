//! Property descriptors: statically registered getter/setter pairs.

use crate::error::{PropertyError, Result};
use crate::types::{TargetType, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased tracked object.
pub type AnyTarget = dyn Any + Send + Sync;

/// Result of a single property access.
pub type PropertyResult<T> = std::result::Result<T, PropertyError>;

type ErasedGetter = dyn Fn(&AnyTarget) -> PropertyResult<Value> + Send + Sync;
type ErasedSetter = dyn Fn(&AnyTarget, Value) -> PropertyResult<()> + Send + Sync;

/// How to read and write one tracked property of a `T`, plus its optional default.
///
/// Accessors are typed against `T` and a serde-compatible value type `V`
/// when built; values cross the store boundary as [`Value`]. Registering a
/// descriptor on a configuration whose target is not a `T` fails
/// immediately.
#[derive(Clone)]
pub struct PropertyDescriptor {
    target_type: TargetType,
    getter: Arc<ErasedGetter>,
    setter: Arc<ErasedSetter>,
    default: Option<Value>,
}

impl PropertyDescriptor {
    /// Descriptor from infallible accessors.
    ///
    /// Targets are shared (`Arc<T>`), so setters work through interior
    /// mutability.
    pub fn new<T, V, G, S>(getter: G, setter: S) -> Self
    where
        T: Any + Send + Sync,
        V: Serialize + DeserializeOwned,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) + Send + Sync + 'static,
    {
        Self::fallible(
            move |target: &T| Ok(getter(target)),
            move |target: &T, value: V| {
                setter(target, value);
                Ok(())
            },
        )
    }

    /// Descriptor from accessors that may fail.
    pub fn fallible<T, V, G, S>(getter: G, setter: S) -> Self
    where
        T: Any + Send + Sync,
        V: Serialize + DeserializeOwned,
        G: Fn(&T) -> PropertyResult<V> + Send + Sync + 'static,
        S: Fn(&T, V) -> PropertyResult<()> + Send + Sync + 'static,
    {
        let erased_getter = move |target: &AnyTarget| -> PropertyResult<Value> {
            let value = getter(downcast::<T>(target)?)?;
            Ok(serde_json::to_value(value)?)
        };
        let erased_setter = move |target: &AnyTarget, value: Value| -> PropertyResult<()> {
            let target = downcast::<T>(target)?;
            let value: V = serde_json::from_value(value)?;
            setter(target, value)
        };

        Self {
            target_type: TargetType::of::<T>(),
            getter: Arc::new(erased_getter),
            setter: Arc::new(erased_setter),
            default: None,
        }
    }

    /// Attach a default applied when the store has no value for the property.
    pub fn with_default<V: Serialize>(self, default: V) -> Result<Self> {
        Ok(self.with_default_value(serde_json::to_value(default)?))
    }

    /// Attach an already-encoded default. `Value::Null` is a real default,
    /// distinct from having none.
    pub fn with_default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn read(&self, target: &AnyTarget) -> PropertyResult<Value> {
        (self.getter)(target)
    }

    pub(crate) fn write(&self, target: &AnyTarget, value: Value) -> PropertyResult<()> {
        (self.setter)(target, value)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("target_type", &self.target_type.name)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

fn downcast<T: Any>(target: &AnyTarget) -> PropertyResult<&T> {
    target
        .downcast_ref::<T>()
        .ok_or(PropertyError::TargetType {
            expected: std::any::type_name::<T>(),
            got: "another type",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Window {
        width: Mutex<u32>,
        title: Mutex<Option<String>>,
    }

    fn width() -> PropertyDescriptor {
        PropertyDescriptor::new(
            |w: &Window| *w.width.lock(),
            |w: &Window, v: u32| *w.width.lock() = v,
        )
    }

    #[test]
    fn test_read_write_through_erased_accessors() {
        let window = Window::default();
        let descriptor = width();

        descriptor.write(&window, json!(1024)).unwrap();
        assert_eq!(*window.width.lock(), 1024);
        assert_eq!(descriptor.read(&window).unwrap(), json!(1024));
        assert_eq!(descriptor.target_type(), TargetType::of::<Window>());
    }

    #[test]
    fn test_conversion_failure_is_property_error() {
        let window = Window::default();
        let result = width().write(&window, json!("wide"));
        assert!(matches!(result, Err(PropertyError::Conversion(_))));
        assert_eq!(*window.width.lock(), 0);
    }

    #[test]
    fn test_wrong_target_type() {
        let other = String::from("not a window");
        assert!(matches!(
            width().read(&other),
            Err(PropertyError::TargetType { .. })
        ));
    }

    #[test]
    fn test_null_default_is_a_default() {
        let title = PropertyDescriptor::new(
            |w: &Window| w.title.lock().clone(),
            |w: &Window, v: Option<String>| *w.title.lock() = v,
        );
        assert!(!title.has_default());

        let title = title.with_default(Option::<String>::None).unwrap();
        assert!(title.has_default());
        assert_eq!(title.default_value(), Some(&Value::Null));
    }
}
