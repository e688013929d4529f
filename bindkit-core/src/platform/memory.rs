//! In-memory blob store for tests and ephemeral hosts.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{AtomicBlobStore, StoreError};

/// Thread-safe blob store backed by a `HashMap`. Not durable.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| StoreError::lock("blob store lock poisoned"))?
            .len())
    }

    /// Whether the store holds no blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Removes every blob, for test isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::lock("blob store lock poisoned"))?
            .clear();
        Ok(())
    }
}

impl AtomicBlobStore for MemoryBlobStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| StoreError::lock("blob store lock poisoned"))?
            .get(name)
            .cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::lock("blob store lock poisoned"))?
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::lock("blob store lock poisoned"))?
            .remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| StoreError::lock("blob store lock poisoned"))?
            .contains_key(name))
    }
}
