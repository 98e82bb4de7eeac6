//! Store contract and the lazily-loading base implementation.

use crate::error::{Result, TrackingError};
use crate::types::Value;
use std::collections::BTreeMap;

/// All values of one store, keyed by property name.
pub type StoreValues = BTreeMap<String, Value>;

/// Key/value persistence unit scoped to one tracked object.
///
/// Reads must observe the latest uncommitted writes. `clear` drops every
/// entry, loaded or not, and never commits.
pub trait Store: Send {
    fn contains_key(&mut self, name: &str) -> Result<bool>;

    /// Read a value. Fails with [`TrackingError::KeyNotFound`] when absent.
    fn get(&mut self, name: &str) -> Result<Value>;

    /// Buffer a write. Not durable until [`Store::commit_changes`].
    fn set(&mut self, name: &str, value: Value) -> Result<()>;

    fn commit_changes(&mut self) -> Result<()>;

    fn clear(&mut self);
}

/// Produces stores from computed store names.
///
/// Implementations must not load data here; loading is deferred to first
/// access so that creating many configurations stays cheap.
pub trait StoreFactory: Send + Sync {
    fn create_store_for_object(&self, object_id: &str) -> Result<Box<dyn Store>>;
}

impl<F> StoreFactory for F
where
    F: Fn(&str) -> Result<Box<dyn Store>> + Send + Sync,
{
    fn create_store_for_object(&self, object_id: &str) -> Result<Box<dyn Store>> {
        self(object_id)
    }
}

/// Physical load/save of a whole value map.
pub trait StoreBackend: Send {
    fn load_values(&self) -> Result<StoreValues>;

    fn save_values(&self, values: &StoreValues) -> Result<()>;
}

/// Store that loads every value on first access and caches them until the
/// next [`Store::clear`]. Commits write the full map through the backend.
pub struct PersistentStore<B> {
    backend: B,
    values: Option<StoreValues>,
}

impl<B: StoreBackend> PersistentStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            values: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether values have been loaded (or cleared) since creation.
    pub fn is_loaded(&self) -> bool {
        self.values.is_some()
    }

    fn values(&mut self) -> Result<&mut StoreValues> {
        if self.values.is_none() {
            self.values = Some(self.backend.load_values()?);
        }
        Ok(self.values.get_or_insert_with(StoreValues::new))
    }
}

impl<B: StoreBackend> Store for PersistentStore<B> {
    fn contains_key(&mut self, name: &str) -> Result<bool> {
        Ok(self.values()?.contains_key(name))
    }

    fn get(&mut self, name: &str) -> Result<Value> {
        self.values()?
            .get(name)
            .cloned()
            .ok_or_else(|| TrackingError::KeyNotFound(name.to_string()))
    }

    fn set(&mut self, name: &str, value: Value) -> Result<()> {
        self.values()?.insert(name.to_string(), value);
        Ok(())
    }

    fn commit_changes(&mut self) -> Result<()> {
        // Snapshot first so a failed save leaves the buffer untouched.
        let values = self.values()?.clone();
        self.backend.save_values(&values)
    }

    fn clear(&mut self) {
        self.values = Some(StoreValues::new());
    }
}
