//! Key/value stores backing tracked objects.
//!
//! A [`Store`] is scoped to one logical object and buffers writes until
//! [`Store::commit_changes`]. A [`StoreFactory`] turns a computed store name
//! into a store handle without loading anything.
//!
//! Two backends ship with the crate:
//! - [`MemoryStoreFactory`]: process-local, shared between handles
//! - [`FileStoreFactory`]: one checksummed file per store name

mod base;
mod file;
mod memory;

pub use base::{PersistentStore, Store, StoreBackend, StoreFactory, StoreValues};
pub use file::{FileBackend, FileStore, FileStoreConfig, FileStoreFactory, StoreEncoding};
pub use memory::{MemoryBackend, MemoryStore, MemoryStoreFactory};
