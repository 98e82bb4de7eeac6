//! Process-local store backend.

use super::base::{PersistentStore, Store, StoreBackend, StoreFactory, StoreValues};
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type SharedStores = Arc<RwLock<HashMap<String, StoreValues>>>;

/// Store handle produced by [`MemoryStoreFactory`].
pub type MemoryStore = PersistentStore<MemoryBackend>;

/// Backend reading and writing one named entry of a shared map.
pub struct MemoryBackend {
    name: String,
    stores: SharedStores,
}

impl MemoryBackend {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl StoreBackend for MemoryBackend {
    fn load_values(&self) -> Result<StoreValues> {
        Ok(self.stores.read().get(&self.name).cloned().unwrap_or_default())
    }

    fn save_values(&self, values: &StoreValues) -> Result<()> {
        self.stores.write().insert(self.name.clone(), values.clone());
        Ok(())
    }
}

/// Factory whose stores share one in-memory map.
///
/// Clones share the same map, so a fresh configuration (or a fresh tracker
/// given a clone of the factory) sees what earlier ones committed.
#[derive(Clone, Default)]
pub struct MemoryStoreFactory {
    stores: SharedStores,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed values of a store, if it was ever committed.
    pub fn committed(&self, name: &str) -> Option<StoreValues> {
        self.stores.read().get(name).cloned()
    }

    /// Names of every committed store, sorted.
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Seed committed values, as if a previous run had persisted them.
    pub fn seed(&self, name: &str, values: StoreValues) {
        self.stores.write().insert(name.to_string(), values);
    }

    pub fn open(&self, name: &str) -> MemoryStore {
        PersistentStore::new(MemoryBackend {
            name: name.to_string(),
            stores: Arc::clone(&self.stores),
        })
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn create_store_for_object(&self, object_id: &str) -> Result<Box<dyn Store>> {
        Ok(Box::new(self.open(object_id)))
    }
}
