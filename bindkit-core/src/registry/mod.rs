//! Locally registered credential sources and their lifecycle.
//!
//! The registry is a catalog of [`CredentialSource`] references scoped to
//! relying parties. Removing an entry removes the reference only — the
//! platform key material behind it is never touched. Deletion with
//! revocation is a two-phase sequence (remote first, then local) with no
//! distributed transaction; a crash between the phases leaves a stale local
//! entry, which is acceptable because `load_all` is advisory.

mod remote;
mod store;
mod types;

pub use remote::{HttpRevocationService, RemoteCredentialRepository, RevocationError};
pub use store::{CredentialSourceStore, JsonCredentialSourceStore};
pub use types::CredentialSource;

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::platform::StoreError;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Remote revocation failed and the local record was kept.
    #[error("remote revocation failed; local record kept")]
    Remote {
        /// The revocation fault.
        #[source]
        source: RevocationError,
    },
    /// The local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Catalog of credential sources registered on this device.
pub struct CredentialRegistry {
    store: Arc<dyn CredentialSourceStore>,
}

impl CredentialRegistry {
    /// Creates a registry over the given local store.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialSourceStore>) -> Self {
        Self { store }
    }

    /// All sources registered for the relying party, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub fn load_all(&self, rp_id: &str) -> Result<Vec<CredentialSource>, RegistryError> {
        self.store.load_all(rp_id).map_err(RegistryError::from)
    }

    /// Locally removes every source registered for the relying party.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be written.
    pub fn delete_by_rp_id(&self, rp_id: &str) -> Result<(), RegistryError> {
        self.store.delete_by_rp_id(rp_id).map_err(RegistryError::from)
    }

    /// Locally removes the given source. Absent records are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be written.
    pub fn delete(&self, source: &CredentialSource) -> Result<(), RegistryError> {
        self.store.delete(source).map_err(RegistryError::from)
    }

    /// Revokes the source remotely, then removes it locally.
    ///
    /// Remote success always deletes the local record. On remote failure
    /// the local record is kept — a revoked-but-forgotten credential cannot
    /// be recovered — unless `force_delete` is set, in which case local
    /// removal proceeds regardless of the remote outcome.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Remote`] when revocation fails without
    /// `force_delete`; [`RegistryError::Store`] if the local removal fails.
    pub async fn delete_with_revocation<R: RemoteCredentialRepository>(
        &self,
        remote: &R,
        source: &CredentialSource,
        force_delete: bool,
    ) -> Result<(), RegistryError> {
        match remote.delete(source).await {
            Ok(()) => {
                debug!("credential revoked remotely; removing local record");
                self.delete(source)
            }
            Err(revocation) if force_delete => {
                warn!("remote revocation failed, force-deleting local record: {revocation}");
                self.delete(source)
            }
            Err(revocation) => Err(RegistryError::Remote { source: revocation }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryBlobStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedRemote {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl ScriptedRemote {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RemoteCredentialRepository for ScriptedRemote {
        async fn delete(&self, _source: &CredentialSource) -> Result<(), RevocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(RevocationError::Rejected { status: 500 })
            }
        }
    }

    fn registry_with(source: &CredentialSource) -> CredentialRegistry {
        let store = JsonCredentialSourceStore::new(Arc::new(MemoryBlobStore::new()));
        store.persist(source).unwrap();
        CredentialRegistry::new(Arc::new(store))
    }

    fn source() -> CredentialSource {
        CredentialSource::new(vec![1], "rp.example.com", vec![9])
    }

    #[tokio::test]
    async fn test_remote_success_always_deletes_locally() {
        let source = source();
        let registry = registry_with(&source);
        let remote = ScriptedRemote::new(true);

        registry
            .delete_with_revocation(&remote, &source, false)
            .await
            .unwrap();
        assert!(registry.load_all("rp.example.com").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_without_force_keeps_the_record() {
        let source = source();
        let registry = registry_with(&source);
        let remote = ScriptedRemote::new(false);

        // Twice: the record survives both attempts.
        for _ in 0..2 {
            let err = registry
                .delete_with_revocation(&remote, &source, false)
                .await
                .unwrap_err();
            assert!(matches!(err, RegistryError::Remote { .. }));
            assert_eq!(registry.load_all("rp.example.com").unwrap().len(), 1);
        }
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_delete_is_idempotent_under_remote_failure() {
        let source = source();
        let registry = registry_with(&source);
        let remote = ScriptedRemote::new(false);

        registry
            .delete_with_revocation(&remote, &source, true)
            .await
            .unwrap();
        assert!(registry.load_all("rp.example.com").unwrap().is_empty());

        // Second force-delete of the now-absent record succeeds silently.
        registry
            .delete_with_revocation(&remote, &source, true)
            .await
            .unwrap();
        assert!(registry.load_all("rp.example.com").unwrap().is_empty());
    }

    #[test]
    fn test_local_delete_by_rp_id() {
        let source = source();
        let registry = registry_with(&source);
        registry.delete_by_rp_id("rp.example.com").unwrap();
        assert!(registry.load_all("rp.example.com").unwrap().is_empty());
    }
}
