//! Credential registry lifecycle against a file-backed store and a mocked
//! revocation server.

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use bindkit_core::platform::FileBlobStore;
use bindkit_core::registry::{
    CredentialRegistry, CredentialSource, CredentialSourceStore, HttpRevocationService,
    JsonCredentialSourceStore, RegistryError,
};

const RP_ID: &str = "openam.example.com";

struct Harness {
    registry: CredentialRegistry,
    root: PathBuf,
}

fn harness(sources: &[CredentialSource]) -> Harness {
    let mut root = std::env::temp_dir();
    root.push(format!("bindkit-registry-it-{}", Uuid::new_v4()));
    let store = JsonCredentialSourceStore::new(Arc::new(FileBlobStore::new(&root)));
    for source in sources {
        store.persist(source).expect("persist source");
    }
    Harness {
        registry: CredentialRegistry::new(Arc::new(store)),
        root,
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn source(id: u8) -> CredentialSource {
    CredentialSource::new(vec![id], RP_ID, vec![id, id, id])
}

#[tokio::test]
async fn test_revoke_then_delete_locally() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/webauthn/credentials/01")
        .match_query(mockito::Matcher::Any)
        .with_status(204)
        .create_async()
        .await;
    let remote = HttpRevocationService::new(server.url());

    let harness = harness(&[source(1), source(2)]);
    harness
        .registry
        .delete_with_revocation(&remote, &source(1), false)
        .await
        .expect("revocation succeeds");
    mock.assert_async().await;

    // Only the revoked source is gone; order of the rest is preserved.
    let remaining = harness.registry.load_all(RP_ID).expect("load");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, vec![2]);
}

#[tokio::test]
async fn test_failed_revocation_keeps_the_record_unless_forced() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/webauthn/credentials/01")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .expect_at_least(2)
        .create_async()
        .await;
    let remote = HttpRevocationService::new(server.url());

    let harness = harness(&[source(1)]);
    let err = harness
        .registry
        .delete_with_revocation(&remote, &source(1), false)
        .await
        .expect_err("revocation fails");
    assert!(matches!(err, RegistryError::Remote { .. }));
    assert_eq!(harness.registry.load_all(RP_ID).expect("load").len(), 1);

    // Force delete removes the record even though the server still refuses.
    harness
        .registry
        .delete_with_revocation(&remote, &source(1), true)
        .await
        .expect("forced delete succeeds");
    assert!(harness.registry.load_all(RP_ID).expect("load").is_empty());
}

#[tokio::test]
async fn test_local_deletes_survive_restart() {
    let mut root = std::env::temp_dir();
    root.push(format!("bindkit-registry-it-{}", Uuid::new_v4()));

    {
        let store = JsonCredentialSourceStore::new(Arc::new(FileBlobStore::new(&root)));
        store.persist(&source(1)).expect("persist");
        store.persist(&source(2)).expect("persist");
        let registry = CredentialRegistry::new(Arc::new(store));
        registry.delete(&source(1)).expect("delete");
    }

    // A fresh store over the same directory sees the surviving record.
    let store = JsonCredentialSourceStore::new(Arc::new(FileBlobStore::new(&root)));
    let registry = CredentialRegistry::new(Arc::new(store));
    let remaining = registry.load_all(RP_ID).expect("load");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, vec![2]);

    let _ = std::fs::remove_dir_all(&root);
}
