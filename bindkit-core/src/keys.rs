//! Key material and the secure key store seam.
//!
//! Bound device keys are P-256 signing keys created through the
//! [`SecureKeyStore`] trait. Platform implementations should back this trait
//! with hardware keystores (Android Keystore, iOS Secure Enclave); the
//! in-process [`SoftwareKeyStore`] exists for hosts without one and for
//! tests.

use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::{Arc, Mutex};

use p256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A bitmask of local-authenticator classes a key may be unlocked with.
///
/// Mirrors the platform keystore's authenticator parameter: a key generated
/// with `STRONG_BIOMETRIC | DEVICE_CREDENTIAL` is usable after either
/// ceremony succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthenticatorClassSet(u8);

impl AuthenticatorClassSet {
    /// No authenticator class; the key is not gated on local authentication.
    pub const EMPTY: Self = Self(0);
    /// Class 3 ("strong") biometric authenticators.
    pub const STRONG_BIOMETRIC: Self = Self(1);
    /// Class 2 ("weak") biometric authenticators.
    pub const WEAK_BIOMETRIC: Self = Self(1 << 1);
    /// Device credential (PIN, pattern or password).
    pub const DEVICE_CREDENTIAL: Self = Self(1 << 2);

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every class in `other` is present in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no class is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AuthenticatorClassSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// A single biometric authenticator class selected by the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorClass {
    /// Class 3 biometric (e.g. secure face or fingerprint unlock).
    Strong,
    /// Class 2 biometric (convenience biometrics).
    Weak,
}

impl AuthenticatorClass {
    /// The class as a one-element [`AuthenticatorClassSet`].
    #[must_use]
    pub const fn as_class_set(self) -> AuthenticatorClassSet {
        match self {
            Self::Strong => AuthenticatorClassSet::STRONG_BIOMETRIC,
            Self::Weak => AuthenticatorClassSet::WEAK_BIOMETRIC,
        }
    }
}

/// Signature scheme requested from the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// ECDSA over P-256 with SHA-256 (JWS `ES256`).
    Es256,
}

/// Protection parameters for a key-pair creation request.
#[derive(Debug, Clone)]
pub struct KeyPairSpec {
    /// Alias the key is stored under.
    pub alias: String,
    /// Requested signature scheme.
    pub algorithm: SigningAlgorithm,
    /// Whether a local-authentication ceremony must unlock the key.
    pub user_authentication_required: bool,
    /// Seconds the key stays usable after a successful ceremony. Matches the
    /// ceremony timeout supplied by the server.
    pub validity_window_seconds: i64,
    /// Authenticator classes allowed to unlock the key.
    pub authenticator_classes: AuthenticatorClassSet,
}

impl KeyPairSpec {
    /// Spec for a key with no local-authentication requirement.
    #[must_use]
    pub fn unattended(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            algorithm: SigningAlgorithm::Es256,
            user_authentication_required: false,
            validity_window_seconds: 0,
            authenticator_classes: AuthenticatorClassSet::EMPTY,
        }
    }

    /// Spec for a key unlocked by the given authenticator classes.
    #[must_use]
    pub fn user_bound(
        alias: impl Into<String>,
        validity_window_seconds: i64,
        authenticator_classes: AuthenticatorClassSet,
    ) -> Self {
        Self {
            alias: alias.into(),
            algorithm: SigningAlgorithm::Es256,
            user_authentication_required: true,
            validity_window_seconds,
            authenticator_classes,
        }
    }
}

/// An opaque reference to a private signing key.
///
/// The raw scalar never leaves this handle; signing happens through it. The
/// `Debug` representation is redacted.
#[derive(Clone)]
pub struct PrivateKeyRef(Arc<SigningKey>);

impl PrivateKeyRef {
    pub(crate) fn new(key: SigningKey) -> Self {
        Self(Arc::new(key))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyRef(redacted)")
    }
}

/// A key pair handle returned by the secure key store.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// The public half, embedded as a JWK in signed assertions.
    pub public_key: VerifyingKey,
    /// Reference to the private half.
    pub private_key: PrivateKeyRef,
    /// Alias the pair is stored under.
    pub key_alias: String,
}

/// Derives the deterministic key alias for a user.
///
/// One alias per user: re-binding the same user overwrites the previous key
/// instead of accumulating orphans.
#[must_use]
pub fn key_alias_for_user(user_id: &str) -> String {
    hex::encode(Sha256::digest(user_id.as_bytes()))
}

/// Errors surfaced by a [`SecureKeyStore`].
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// The store rejected the key specification.
    #[error("key specification rejected: {reason}")]
    Rejected {
        /// Why the specification was refused.
        reason: String,
    },
    /// The store cannot be reached (locked device, missing hardware).
    #[error("key store unavailable")]
    Unavailable,
    /// The store failed while creating or loading the key.
    #[error("key store failure: {message}")]
    Failure {
        /// Description of the underlying fault.
        message: String,
    },
}

/// Platform secure key store.
///
/// Implementations create and hold private keys; the SDK only ever receives
/// [`KeyPair`] handles. Keys created with
/// [`KeyPairSpec::user_authentication_required`] must be unusable until the
/// platform's local-authentication ceremony succeeds.
pub trait SecureKeyStore: Send + Sync {
    /// Creates a key pair under `spec.alias`, replacing any previous pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the specification or key
    /// creation fails.
    fn create_key_pair(&self, spec: &KeyPairSpec) -> Result<KeyPair, KeyStoreError>;

    /// Looks up a previously created key pair by alias.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. An absent alias is
    /// `Ok(None)`, not an error.
    fn retrieve_key_pair(&self, alias: &str) -> Result<Option<KeyPair>, KeyStoreError>;

    /// Removes the key pair stored under `alias`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_key_pair(&self, alias: &str) -> Result<(), KeyStoreError>;
}

/// In-process software key store.
///
/// Keys live in memory and the user-authentication requirement of a spec is
/// recorded but not enforced; enforcement belongs to hardware-backed
/// implementations. Suitable for tests and for hosts without a platform
/// keystore.
#[derive(Default)]
pub struct SoftwareKeyStore {
    keys: Mutex<HashMap<String, SigningKey>>,
}

impl SoftwareKeyStore {
    /// Creates an empty software key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SigningKey>>, KeyStoreError> {
        self.keys.lock().map_err(|_| KeyStoreError::Failure {
            message: "key store lock poisoned".to_string(),
        })
    }
}

impl SecureKeyStore for SoftwareKeyStore {
    fn create_key_pair(&self, spec: &KeyPairSpec) -> Result<KeyPair, KeyStoreError> {
        if spec.alias.is_empty() {
            return Err(KeyStoreError::Rejected {
                reason: "key alias must not be empty".to_string(),
            });
        }
        let SigningAlgorithm::Es256 = spec.algorithm;
        let signing_key = SigningKey::random(&mut OsRng);
        let pair = KeyPair {
            public_key: *signing_key.verifying_key(),
            private_key: PrivateKeyRef::new(signing_key.clone()),
            key_alias: spec.alias.clone(),
        };
        self.lock()?.insert(spec.alias.clone(), signing_key);
        Ok(pair)
    }

    fn retrieve_key_pair(&self, alias: &str) -> Result<Option<KeyPair>, KeyStoreError> {
        Ok(self.lock()?.get(alias).map(|signing_key| KeyPair {
            public_key: *signing_key.verifying_key(),
            private_key: PrivateKeyRef::new(signing_key.clone()),
            key_alias: alias.to_string(),
        }))
    }

    fn delete_key_pair(&self, alias: &str) -> Result<(), KeyStoreError> {
        self.lock()?.remove(alias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_set_union_and_contains() {
        let set = AuthenticatorClassSet::STRONG_BIOMETRIC
            | AuthenticatorClassSet::DEVICE_CREDENTIAL;
        assert!(set.contains(AuthenticatorClassSet::STRONG_BIOMETRIC));
        assert!(set.contains(AuthenticatorClassSet::DEVICE_CREDENTIAL));
        assert!(!set.contains(AuthenticatorClassSet::WEAK_BIOMETRIC));
        assert!(AuthenticatorClassSet::EMPTY.is_empty());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_key_alias_is_deterministic_per_user() {
        let alias = key_alias_for_user("id=demo,ou=user");
        assert_eq!(alias, key_alias_for_user("id=demo,ou=user"));
        assert_ne!(alias, key_alias_for_user("id=other,ou=user"));
        assert_eq!(alias.len(), 64);
    }

    #[test]
    fn test_software_store_create_retrieve_delete() {
        let store = SoftwareKeyStore::new();
        let spec = KeyPairSpec::unattended("alias-1");
        let pair = store.create_key_pair(&spec).unwrap();
        assert_eq!(pair.key_alias, "alias-1");

        let retrieved = store.retrieve_key_pair("alias-1").unwrap().unwrap();
        assert_eq!(retrieved.public_key, pair.public_key);
        assert!(store.retrieve_key_pair("missing").unwrap().is_none());

        store.delete_key_pair("alias-1").unwrap();
        assert!(store.retrieve_key_pair("alias-1").unwrap().is_none());
    }

    #[test]
    fn test_software_store_rejects_empty_alias() {
        let store = SoftwareKeyStore::new();
        let err = store
            .create_key_pair(&KeyPairSpec::unattended(""))
            .unwrap_err();
        assert!(matches!(err, KeyStoreError::Rejected { .. }));
    }

    #[test]
    fn test_user_bound_spec_carries_protection_parameters() {
        let spec = KeyPairSpec::user_bound(
            "alias",
            20,
            AuthenticatorClassSet::WEAK_BIOMETRIC,
        );
        assert!(spec.user_authentication_required);
        assert_eq!(spec.validity_window_seconds, 20);
        assert!(spec
            .authenticator_classes
            .contains(AuthenticatorClassSet::WEAK_BIOMETRIC));
    }
}
