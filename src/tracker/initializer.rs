//! Initializer selection per target type.

use crate::error::Result;
use crate::tracking::TrackingConfiguration;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Populates a freshly created configuration: key, tracked properties,
/// defaults.
pub trait ConfigurationInitializer: Send + Sync {
    /// Type this initializer is registered for. `None` is the universal
    /// base, matched when nothing more specific is registered.
    fn for_type(&self) -> Option<TypeId>;

    fn initialize_configuration(&self, configuration: &TrackingConfiguration) -> Result<()>;
}

/// Registered initializers plus declared supertype links.
pub(crate) struct InitializerSet {
    by_type: HashMap<Option<TypeId>, Arc<dyn ConfigurationInitializer>>,
    supertypes: HashMap<TypeId, TypeId>,
}

impl InitializerSet {
    pub(crate) fn new(default: Arc<dyn ConfigurationInitializer>) -> Self {
        let mut by_type = HashMap::new();
        by_type.insert(None, default);
        Self {
            by_type,
            supertypes: HashMap::new(),
        }
    }

    /// Last registration for a type wins.
    pub(crate) fn register(&mut self, initializer: Arc<dyn ConfigurationInitializer>) {
        self.by_type.insert(initializer.for_type(), initializer);
    }

    pub(crate) fn declare_supertype(&mut self, child: TypeId, parent: TypeId) {
        self.supertypes.insert(child, parent);
    }

    /// Most specific initializer: exact type, then declared supertypes, then
    /// the universal one.
    pub(crate) fn find(&self, ty: TypeId) -> Option<Arc<dyn ConfigurationInitializer>> {
        let mut visited = HashSet::new();
        let mut current = Some(ty);

        while let Some(ty) = current {
            if let Some(initializer) = self.by_type.get(&Some(ty)) {
                return Some(Arc::clone(initializer));
            }
            if !visited.insert(ty) {
                break;
            }
            current = self.supertypes.get(&ty).copied();
        }

        self.by_type.get(&None).cloned()
    }
}
