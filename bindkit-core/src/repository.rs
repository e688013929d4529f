//! Persisted binding records.
//!
//! One record per bound user: which key alias the user is bound with, under
//! which policy, and the `kid` the record store issued for it. Records are
//! overwritten on re-binding and never merged across users.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::platform::{AtomicBlobStore, StoreError};
use crate::BindingPolicy;

const RECORDS_BLOB: &str = "binding_records.json";

/// A persisted device binding for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    /// The bound user id.
    pub user_id: String,
    /// Display name supplied by the server callback.
    pub display_name: String,
    /// Alias of the bound key in the secure key store.
    pub key_alias: String,
    /// Key identifier issued at persist time, embedded in assertions.
    pub kid: String,
    /// Policy the key is protected under.
    pub policy: BindingPolicy,
}

/// Store of binding records.
pub trait BindingRepository: Send + Sync {
    /// Persists a binding for `user_id`, replacing any existing record for
    /// that user, and returns the issued `kid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn persist(
        &self,
        user_id: &str,
        display_name: &str,
        key_alias: &str,
        policy: BindingPolicy,
    ) -> Result<String, StoreError>;

    /// Looks up the binding record for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find(&self, user_id: &str) -> Result<Option<BindingRecord>, StoreError>;

    /// Deletes the binding record for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Binding repository storing records as one JSON document in a blob store.
pub struct JsonBindingRepository {
    store: Arc<dyn AtomicBlobStore>,
}

impl JsonBindingRepository {
    /// Creates a repository over the given blob store.
    #[must_use]
    pub fn new(store: Arc<dyn AtomicBlobStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<Vec<BindingRecord>, StoreError> {
        match self.store.read(RECORDS_BLOB)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StoreError::serialization(err.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[BindingRecord]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(records)
            .map_err(|err| StoreError::serialization(err.to_string()))?;
        self.store.write_atomic(RECORDS_BLOB, &bytes)
    }
}

impl BindingRepository for JsonBindingRepository {
    fn persist(
        &self,
        user_id: &str,
        display_name: &str,
        key_alias: &str,
        policy: BindingPolicy,
    ) -> Result<String, StoreError> {
        let kid = Uuid::new_v4().to_string();
        let mut records = self.load()?;
        records.retain(|record| record.user_id != user_id);
        records.push(BindingRecord {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            key_alias: key_alias.to_string(),
            kid: kid.clone(),
            policy,
        });
        self.save(&records)?;
        log::debug!("persisted binding record for user, kid={kid}");
        Ok(kid)
    }

    fn find(&self, user_id: &str) -> Result<Option<BindingRecord>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|record| record.user_id == user_id))
    }

    fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|record| record.user_id != user_id);
        if records.len() != before {
            self.save(&records)?;
        }
        Ok(())
    }
}
