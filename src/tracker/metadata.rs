//! Metadata-driven default initializer.
//!
//! Types describe their trackable properties once with [`TypeMetadata`];
//! the [`MetadataInitializer`] applies that description to every new
//! configuration whose target has that type.

use super::initializer::ConfigurationInitializer;
use crate::error::{Result, TrackingError};
use crate::tracking::{AnyTarget, PropertyDescriptor, TrackingConfiguration};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type KeyFn<T> = dyn Fn(&T) -> String + Send + Sync;
type PostInitFn<T> = dyn Fn(&T, &TrackingConfiguration) -> Result<()> + Send + Sync;

/// A declared trackable property.
#[derive(Clone, Debug)]
struct TrackableProperty {
    name: String,
    /// Only trackers with this name pick the property up.
    tracker: Option<String>,
    descriptor: PropertyDescriptor,
}

/// Description of how to track values of type `T`.
pub struct TypeMetadata<T> {
    key: Option<Arc<KeyFn<T>>>,
    properties: Vec<TrackableProperty>,
    post_init: Option<Arc<PostInitFn<T>>>,
}

impl<T: Any + Send + Sync> TypeMetadata<T> {
    pub fn new() -> Self {
        Self {
            key: None,
            properties: Vec::new(),
            post_init: None,
        }
    }

    /// Derive the configuration key from the target.
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.key = Some(Arc::new(key));
        self
    }

    /// Property picked up by unnamed trackers.
    pub fn property(mut self, name: impl Into<String>, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(TrackableProperty {
            name: name.into(),
            tracker: None,
            descriptor,
        });
        self
    }

    /// Property picked up only by the tracker named `tracker`.
    pub fn property_for(
        mut self,
        tracker: impl Into<String>,
        name: impl Into<String>,
        descriptor: PropertyDescriptor,
    ) -> Self {
        self.properties.push(TrackableProperty {
            name: name.into(),
            tracker: Some(tracker.into()),
            descriptor,
        });
        self
    }

    /// Hook run after declared properties are added, for programmatic setup.
    pub fn post_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T, &TrackingConfiguration) -> Result<()> + Send + Sync + 'static,
    {
        self.post_init = Some(Arc::new(hook));
        self
    }
}

impl<T: Any + Send + Sync> Default for TypeMetadata<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe view of a `TypeMetadata<T>`.
trait DescribeTarget: Send + Sync {
    fn describe(&self, target: &AnyTarget, configuration: &TrackingConfiguration) -> Result<()>;
}

impl<T: Any + Send + Sync> DescribeTarget for TypeMetadata<T> {
    fn describe(&self, target: &AnyTarget, configuration: &TrackingConfiguration) -> Result<()> {
        let target = target.downcast_ref::<T>().ok_or_else(|| {
            TrackingError::InvalidOperation(format!(
                "Metadata for {} applied to {}",
                std::any::type_name::<T>(),
                configuration.target_type()
            ))
        })?;

        if let Some(key) = &self.key {
            configuration.set_key(Some(key(target)))?;
        }

        for property in &self.properties {
            if property.tracker.as_deref() == configuration.tracker_name() {
                configuration.add_property(property.name.clone(), property.descriptor.clone())?;
            }
        }

        if let Some(post_init) = &self.post_init {
            post_init(target, configuration)?;
        }
        Ok(())
    }
}

/// Default initializer: applies registered [`TypeMetadata`], does nothing
/// for undescribed types.
#[derive(Default)]
pub struct MetadataInitializer {
    metadata: RwLock<HashMap<TypeId, Arc<dyn DescribeTarget>>>,
}

impl MetadataInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the description of `T`.
    pub fn register<T: Any + Send + Sync>(&self, metadata: TypeMetadata<T>) {
        self.metadata
            .write()
            .insert(TypeId::of::<T>(), Arc::new(metadata));
    }

    pub fn is_described(&self, ty: TypeId) -> bool {
        self.metadata.read().contains_key(&ty)
    }
}

impl ConfigurationInitializer for MetadataInitializer {
    fn for_type(&self) -> Option<TypeId> {
        None
    }

    fn initialize_configuration(&self, configuration: &TrackingConfiguration) -> Result<()> {
        let Some(target) = configuration.target() else {
            return Ok(());
        };
        let metadata = self
            .metadata
            .read()
            .get(&configuration.target_type().id)
            .cloned();

        match metadata {
            Some(metadata) => metadata.describe(&*target, configuration),
            None => {
                debug!(target_type = %configuration.target_type(), "No tracking metadata");
                Ok(())
            }
        }
    }
}
