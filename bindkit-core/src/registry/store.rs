//! Local persistence of credential sources.

use std::sync::Arc;

use crate::platform::{AtomicBlobStore, StoreError};

use super::types::CredentialSource;

const SOURCES_BLOB: &str = "credential_sources.json";

/// Store of locally registered credential sources.
///
/// `load_all` returns sources in storage insertion order; deletes are
/// local-only and deleting an absent record is not an error.
pub trait CredentialSourceStore: Send + Sync {
    /// All sources registered for the relying party, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_all(&self, rp_id: &str) -> Result<Vec<CredentialSource>, StoreError>;

    /// Appends a source to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn persist(&self, source: &CredentialSource) -> Result<(), StoreError>;

    /// Removes every source registered for the relying party.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_by_rp_id(&self, rp_id: &str) -> Result<(), StoreError>;

    /// Removes the source with the given record's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, source: &CredentialSource) -> Result<(), StoreError>;
}

/// Credential source store keeping one JSON document in a blob store.
pub struct JsonCredentialSourceStore {
    store: Arc<dyn AtomicBlobStore>,
}

impl JsonCredentialSourceStore {
    /// Creates a store over the given blob store.
    #[must_use]
    pub fn new(store: Arc<dyn AtomicBlobStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<Vec<CredentialSource>, StoreError> {
        match self.store.read(SOURCES_BLOB)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StoreError::serialization(err.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, sources: &[CredentialSource]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(sources)
            .map_err(|err| StoreError::serialization(err.to_string()))?;
        self.store.write_atomic(SOURCES_BLOB, &bytes)
    }
}

impl CredentialSourceStore for JsonCredentialSourceStore {
    fn load_all(&self, rp_id: &str) -> Result<Vec<CredentialSource>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|source| source.relying_party_id == rp_id)
            .collect())
    }

    fn persist(&self, source: &CredentialSource) -> Result<(), StoreError> {
        let mut sources = self.load()?;
        sources.push(source.clone());
        self.save(&sources)
    }

    fn delete_by_rp_id(&self, rp_id: &str) -> Result<(), StoreError> {
        let mut sources = self.load()?;
        let before = sources.len();
        sources.retain(|existing| existing.relying_party_id != rp_id);
        if sources.len() != before {
            self.save(&sources)?;
        }
        Ok(())
    }

    fn delete(&self, source: &CredentialSource) -> Result<(), StoreError> {
        let mut sources = self.load()?;
        let before = sources.len();
        sources.retain(|existing| existing.id != source.id);
        if sources.len() != before {
            self.save(&sources)?;
        }
        Ok(())
    }
}
