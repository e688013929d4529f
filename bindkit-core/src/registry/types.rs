//! Credential source records.

use serde::{Deserialize, Serialize};

/// Reference to a locally registered credential.
///
/// A credential source is a catalog entry, not key material: it points at a
/// platform key via `key_handle`, and deleting the source never deletes the
/// underlying key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CredentialSource {
    /// Credential id assigned at registration.
    pub id: Vec<u8>,
    /// Relying party the credential is scoped to.
    pub relying_party_id: String,
    /// Opaque handle of the platform key backing the credential.
    pub key_handle: Vec<u8>,
}

impl CredentialSource {
    /// Creates a credential source record.
    #[must_use]
    pub fn new(
        id: Vec<u8>,
        relying_party_id: impl Into<String>,
        key_handle: Vec<u8>,
    ) -> Self {
        Self {
            id,
            relying_party_id: relying_party_id.into(),
            key_handle,
        }
    }
}
