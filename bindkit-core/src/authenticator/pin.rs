//! Application-PIN authenticator.
//!
//! The binding key for this policy is not gated by a platform authenticator:
//! its private half is sealed under a key derived from user-entered
//! characters (HKDF-SHA256 into XChaCha20-Poly1305) and stored in a
//! caller-substitutable blob store. Authentication succeeds exactly when the
//! entered PIN unwraps the stored key.

use std::sync::Arc;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

use crate::ceremony::{
    DeviceBindingStatus, ABORT_CODE_CANCELED, ABORT_MESSAGE_INVALID_CREDENTIAL,
    ABORT_MESSAGE_USER_TERMINATED,
};
use crate::keys::{KeyPair, KeyStoreError, PrivateKeyRef};
use crate::platform::{AtomicBlobStore, StoreError};
use crate::prompt::{PinCollector, PromptInfo};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const WRAP_LABEL: &[u8] = b"bindkit:pin-key-wrap";

/// Errors around the PIN-wrapped key blob.
#[derive(Debug, Error)]
pub enum PinKeyError {
    /// No wrapped key is stored under the alias.
    #[error("no wrapped key stored under this alias")]
    NotFound,
    /// The supplied PIN does not unwrap the stored key.
    #[error("the supplied PIN does not unwrap the stored key")]
    InvalidPin,
    /// Sealing the key failed.
    #[error("failed to seal the key: {message}")]
    Seal {
        /// Description of the fault.
        message: String,
    },
    /// The backing blob store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stores private keys sealed under a PIN-derived key.
pub struct PinWrappedKeyStore {
    vault: Arc<dyn AtomicBlobStore>,
}

impl PinWrappedKeyStore {
    /// Creates a store over the given blob store.
    #[must_use]
    pub fn new(vault: Arc<dyn AtomicBlobStore>) -> Self {
        Self { vault }
    }

    /// Whether the backing store can accept a wrapped key.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.vault.writable()
    }

    fn blob_name(alias: &str) -> String {
        format!("{alias}.pinkey")
    }

    fn derive_wrap_key(pin: &SecretString, salt: &[u8]) -> Key {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), pin.expose_secret().as_bytes());
        let mut okm = [0u8; 32];
        // expand only fails for oversized outputs; 32 bytes is in range.
        hkdf.expand(WRAP_LABEL, &mut okm)
            .unwrap_or_else(|_| unreachable!("32-byte HKDF output is always valid"));
        let key = Key::clone_from_slice(&okm);
        okm.zeroize();
        key
    }

    /// Seals `key` under `pin` and stores the blob for `alias`, replacing
    /// any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if sealing or the store write fails.
    pub fn wrap(
        &self,
        alias: &str,
        key: &SigningKey,
        pin: &SecretString,
    ) -> Result<(), PinKeyError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new(&Self::derive_wrap_key(pin, &salt));
        let mut plaintext = key.to_bytes().to_vec();
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|_| PinKeyError::Seal {
                message: "AEAD encryption failed".to_string(),
            })?;
        plaintext.zeroize();

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        self.vault
            .write_atomic(&Self::blob_name(alias), &blob)
            .map_err(PinKeyError::from)
    }

    /// Unwraps the key stored for `alias` with the supplied PIN.
    ///
    /// # Errors
    ///
    /// [`PinKeyError::InvalidPin`] when the PIN does not authenticate the
    /// blob, [`PinKeyError::NotFound`] when no blob exists.
    pub fn unwrap(&self, alias: &str, pin: &SecretString) -> Result<SigningKey, PinKeyError> {
        let blob = self
            .vault
            .read(&Self::blob_name(alias))?
            .ok_or(PinKeyError::NotFound)?;
        if blob.len() <= SALT_LEN + NONCE_LEN {
            return Err(PinKeyError::InvalidPin);
        }
        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new(&Self::derive_wrap_key(pin, salt));
        let mut plaintext = cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|_| PinKeyError::InvalidPin)?;
        let key = SigningKey::from_slice(&plaintext).map_err(|_| PinKeyError::InvalidPin);
        plaintext.zeroize();
        key
    }

    /// Removes the wrapped key blob for `alias`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn remove(&self, alias: &str) -> Result<(), StoreError> {
        self.vault.delete(&Self::blob_name(alias))
    }
}

/// Authenticator for [`crate::BindingPolicy::ApplicationPin`].
pub struct ApplicationPinAuthenticator {
    collector: Arc<dyn PinCollector>,
    store: PinWrappedKeyStore,
    prompt: PromptInfo,
    key_alias: String,
}

impl ApplicationPinAuthenticator {
    /// Creates the authenticator over a PIN collector and the blob store
    /// holding wrapped keys.
    #[must_use]
    pub fn new(
        collector: Arc<dyn PinCollector>,
        vault: Arc<dyn AtomicBlobStore>,
        prompt: PromptInfo,
        key_alias: String,
    ) -> Self {
        Self {
            collector,
            store: PinWrappedKeyStore::new(vault),
            prompt,
            key_alias,
        }
    }

    pub(crate) fn is_supported(&self) -> bool {
        self.store.is_available()
    }

    pub(crate) fn generate_keys(&self) -> Result<KeyPair, KeyStoreError> {
        let pin = self
            .collector
            .request_pin(&self.prompt)
            .ok_or_else(|| KeyStoreError::Rejected {
                reason: "PIN entry was dismissed".to_string(),
            })?;
        let signing_key = SigningKey::random(&mut OsRng);
        self.store
            .wrap(&self.key_alias, &signing_key, &pin)
            .map_err(|err| KeyStoreError::Failure {
                message: err.to_string(),
            })?;
        Ok(KeyPair {
            public_key: *signing_key.verifying_key(),
            private_key: PrivateKeyRef::new(signing_key),
            key_alias: self.key_alias.clone(),
        })
    }

    pub(crate) fn authenticate(&self, timeout_seconds: i64) -> DeviceBindingStatus {
        if timeout_seconds <= 0 {
            return DeviceBindingStatus::Timeout;
        }
        let Some(pin) = self.collector.request_pin(&self.prompt) else {
            return DeviceBindingStatus::Abort {
                code: ABORT_CODE_CANCELED,
                message: ABORT_MESSAGE_USER_TERMINATED.to_string(),
            };
        };
        match self.store.unwrap(&self.key_alias, &pin) {
            Ok(key) => DeviceBindingStatus::Success {
                key: Some(PrivateKeyRef::new(key)),
            },
            Err(PinKeyError::InvalidPin | PinKeyError::NotFound) => DeviceBindingStatus::Abort {
                code: ABORT_CODE_CANCELED,
                message: ABORT_MESSAGE_INVALID_CREDENTIAL.to_string(),
            },
            Err(err) => DeviceBindingStatus::Abort {
                code: ABORT_CODE_CANCELED,
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryBlobStore;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::Signature;
    use std::sync::Mutex;

    struct ScriptedPins {
        pins: Mutex<Vec<Option<&'static str>>>,
    }

    impl ScriptedPins {
        fn new(pins: Vec<Option<&'static str>>) -> Self {
            Self {
                pins: Mutex::new(pins),
            }
        }
    }

    impl PinCollector for ScriptedPins {
        fn request_pin(&self, _prompt: &PromptInfo) -> Option<SecretString> {
            let mut pins = self.pins.lock().unwrap();
            pins.remove(0).map(|pin| SecretString::from(pin.to_string()))
        }
    }

    fn prompt() -> PromptInfo {
        PromptInfo::new("Authentication required", "Device binding", "Enter PIN")
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let store = PinWrappedKeyStore::new(Arc::new(MemoryBlobStore::new()));
        let key = SigningKey::random(&mut OsRng);
        let pin = SecretString::from("1234".to_string());

        store.wrap("alias", &key, &pin).unwrap();
        let unwrapped = store.unwrap("alias", &pin).unwrap();

        // The unwrapped key signs identically to the original.
        let original: Signature = key.sign(b"probe");
        let recovered: Signature = unwrapped.sign(b"probe");
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_wrong_pin_does_not_unwrap() {
        let store = PinWrappedKeyStore::new(Arc::new(MemoryBlobStore::new()));
        let key = SigningKey::random(&mut OsRng);
        store
            .wrap("alias", &key, &SecretString::from("1234".to_string()))
            .unwrap();
        let err = store
            .unwrap("alias", &SecretString::from("4321".to_string()))
            .unwrap_err();
        assert!(matches!(err, PinKeyError::InvalidPin));
    }

    #[test]
    fn test_unwrap_missing_alias() {
        let store = PinWrappedKeyStore::new(Arc::new(MemoryBlobStore::new()));
        let err = store
            .unwrap("absent", &SecretString::from("1234".to_string()))
            .unwrap_err();
        assert!(matches!(err, PinKeyError::NotFound));
    }

    #[test]
    fn test_authenticate_success_with_matching_pin() {
        let collector = Arc::new(ScriptedPins::new(vec![Some("1234"), Some("1234")]));
        let authenticator = ApplicationPinAuthenticator::new(
            collector,
            Arc::new(MemoryBlobStore::new()),
            prompt(),
            "alias".to_string(),
        );
        assert!(authenticator.is_supported());
        authenticator.generate_keys().unwrap();
        let status = authenticator.authenticate(20);
        assert!(matches!(status, DeviceBindingStatus::Success { key: Some(_) }));
    }

    #[test]
    fn test_authenticate_wrong_pin_aborts_with_invalid_credential() {
        let collector = Arc::new(ScriptedPins::new(vec![Some("1234"), Some("9999")]));
        let authenticator = ApplicationPinAuthenticator::new(
            collector,
            Arc::new(MemoryBlobStore::new()),
            prompt(),
            "alias".to_string(),
        );
        authenticator.generate_keys().unwrap();
        match authenticator.authenticate(20) {
            DeviceBindingStatus::Abort { code, message } => {
                assert_eq!(code, ABORT_CODE_CANCELED);
                assert_eq!(message, ABORT_MESSAGE_INVALID_CREDENTIAL);
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_authenticate_dismissed_entry_aborts() {
        let collector = Arc::new(ScriptedPins::new(vec![Some("1234"), None]));
        let authenticator = ApplicationPinAuthenticator::new(
            collector,
            Arc::new(MemoryBlobStore::new()),
            prompt(),
            "alias".to_string(),
        );
        authenticator.generate_keys().unwrap();
        match authenticator.authenticate(20) {
            DeviceBindingStatus::Abort { message, .. } => {
                assert_eq!(message, ABORT_MESSAGE_USER_TERMINATED);
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_forced_timeout_branch() {
        let collector = Arc::new(ScriptedPins::new(vec![]));
        let authenticator = ApplicationPinAuthenticator::new(
            collector,
            Arc::new(MemoryBlobStore::new()),
            prompt(),
            "alias".to_string(),
        );
        assert!(matches!(
            authenticator.authenticate(-100),
            DeviceBindingStatus::Timeout
        ));
    }
}
