//! Binding-policy authenticator strategies.
//!
//! One strategy per [`BindingPolicy`], all implementing the same contract:
//! generate the bound key pair, check device support, run the
//! local-authentication ceremony and sign the challenge. The
//! [`DeviceAuthenticator`] enum is the closed dispatch point; the factory
//! maps a policy onto its strategy.

mod pin;

pub use pin::{ApplicationPinAuthenticator, PinKeyError, PinWrappedKeyStore};

use std::sync::Arc;

use crate::binding::BindingContext;
use crate::capability::{CapabilityProbe, DeviceCapabilities};
use crate::ceremony::{await_ceremony, AuthenticationListener, DeviceBindingStatus};
use crate::jws::{sign_assertion, AssertionError};
use crate::keys::{
    key_alias_for_user, AuthenticatorClass, AuthenticatorClassSet, KeyPair, KeyPairSpec,
    KeyStoreError, SecureKeyStore,
};
use crate::prompt::{PromptInfo, UserAuthenticationUi};
use crate::BindingPolicy;

/// Authenticator for the biometric policies.
///
/// Covers both `BiometricOnly` and `BiometricOrCredential`; the latter adds
/// the device credential to the key's authenticator classes and to the
/// support check.
pub struct BiometricAuthenticator {
    probe: CapabilityProbe,
    key_store: Arc<dyn SecureKeyStore>,
    ui: Arc<dyn UserAuthenticationUi>,
    prompt: PromptInfo,
    key_alias: String,
    validity_window_seconds: i64,
    allow_device_credential: bool,
}

impl BiometricAuthenticator {
    /// Creates a biometric authenticator.
    ///
    /// `allow_device_credential` selects the fallback flavor of the policy.
    #[must_use]
    pub fn new(
        capabilities: Arc<dyn DeviceCapabilities>,
        key_store: Arc<dyn SecureKeyStore>,
        ui: Arc<dyn UserAuthenticationUi>,
        prompt: PromptInfo,
        key_alias: String,
        validity_window_seconds: i64,
        allow_device_credential: bool,
    ) -> Self {
        Self {
            probe: CapabilityProbe::new(capabilities),
            key_store,
            ui,
            prompt,
            key_alias,
            validity_window_seconds,
            allow_device_credential,
        }
    }

    fn is_supported(&self) -> bool {
        if self.allow_device_credential {
            self.probe.supports_biometric_or_credential()
        } else {
            self.probe.supports_biometric_only()
        }
    }

    fn generate_keys(&self) -> Result<KeyPair, KeyStoreError> {
        // The support check has already run and recorded the class to
        // request; Strong is the conservative default if it has not.
        let class = self
            .probe
            .selected_class()
            .unwrap_or(AuthenticatorClass::Strong);
        let mut classes = class.as_class_set();
        if self.allow_device_credential {
            classes = classes.union(AuthenticatorClassSet::DEVICE_CREDENTIAL);
        }
        let spec = KeyPairSpec::user_bound(
            self.key_alias.clone(),
            self.validity_window_seconds,
            classes,
        );
        self.key_store.create_key_pair(&spec)
    }

    async fn authenticate(&self, timeout_seconds: i64) -> DeviceBindingStatus {
        if timeout_seconds <= 0 {
            return DeviceBindingStatus::Timeout;
        }
        let (listener, receiver) = AuthenticationListener::channel();
        self.ui.present(&self.prompt, listener);
        await_ceremony(receiver, timeout_seconds).await
    }
}

/// Authenticator for [`BindingPolicy::None`].
///
/// The key carries no local-authentication requirement and the ceremony
/// resolves successfully without user interaction.
pub struct UnattendedAuthenticator {
    key_store: Arc<dyn SecureKeyStore>,
    key_alias: String,
}

impl UnattendedAuthenticator {
    /// Creates the unattended authenticator.
    #[must_use]
    pub fn new(key_store: Arc<dyn SecureKeyStore>, key_alias: String) -> Self {
        Self {
            key_store,
            key_alias,
        }
    }

    fn generate_keys(&self) -> Result<KeyPair, KeyStoreError> {
        self.key_store
            .create_key_pair(&KeyPairSpec::unattended(self.key_alias.clone()))
    }

    const fn authenticate() -> DeviceBindingStatus {
        DeviceBindingStatus::Success { key: None }
    }
}

/// The strategy set: one variant per binding policy.
pub enum DeviceAuthenticator {
    /// Strong or weak biometric, no fallback.
    BiometricOnly(BiometricAuthenticator),
    /// Biometric with device-credential fallback.
    BiometricOrCredential(BiometricAuthenticator),
    /// Key wrapped under an application PIN.
    ApplicationPin(ApplicationPinAuthenticator),
    /// No local authentication.
    None(UnattendedAuthenticator),
}

impl DeviceAuthenticator {
    /// Builds the strategy for `policy` from the ceremony context.
    ///
    /// The key alias is derived from `user_id`, and the server-declared
    /// `timeout_seconds` becomes the authentication validity window of
    /// user-bound keys.
    #[must_use]
    pub fn for_policy(
        policy: BindingPolicy,
        context: &BindingContext,
        prompt: &PromptInfo,
        user_id: &str,
        timeout_seconds: i64,
    ) -> Self {
        let key_alias = key_alias_for_user(user_id);
        match policy {
            BindingPolicy::BiometricOnly => Self::BiometricOnly(BiometricAuthenticator::new(
                Arc::clone(&context.capabilities),
                Arc::clone(&context.key_store),
                Arc::clone(&context.authentication_ui),
                prompt.clone(),
                key_alias,
                timeout_seconds,
                false,
            )),
            BindingPolicy::BiometricOrCredential => {
                Self::BiometricOrCredential(BiometricAuthenticator::new(
                    Arc::clone(&context.capabilities),
                    Arc::clone(&context.key_store),
                    Arc::clone(&context.authentication_ui),
                    prompt.clone(),
                    key_alias,
                    timeout_seconds,
                    true,
                ))
            }
            BindingPolicy::ApplicationPin => Self::ApplicationPin(ApplicationPinAuthenticator::new(
                Arc::clone(&context.pin_collector),
                Arc::clone(&context.pin_vault),
                prompt.clone(),
                key_alias,
            )),
            BindingPolicy::None => Self::None(UnattendedAuthenticator::new(
                Arc::clone(&context.key_store),
                key_alias,
            )),
        }
    }

    /// Whether the device currently satisfies this strategy's policy.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        match self {
            Self::BiometricOnly(inner) | Self::BiometricOrCredential(inner) => {
                inner.is_supported()
            }
            Self::ApplicationPin(inner) => inner.is_supported(),
            Self::None(_) => true,
        }
    }

    /// Requests the bound key pair with policy-derived protection.
    ///
    /// # Errors
    ///
    /// Returns the key store fault if the pair cannot be created.
    pub fn generate_keys(&self) -> Result<KeyPair, KeyStoreError> {
        match self {
            Self::BiometricOnly(inner) | Self::BiometricOrCredential(inner) => {
                inner.generate_keys()
            }
            Self::ApplicationPin(inner) => inner.generate_keys(),
            Self::None(inner) => inner.generate_keys(),
        }
    }

    /// Runs the local-authentication ceremony.
    ///
    /// Resolves exactly once: success, abort, or timeout. A non-positive
    /// `timeout_seconds` forces the timeout branch for the user-mediated
    /// strategies; the unattended strategy succeeds immediately.
    pub async fn authenticate(&self, timeout_seconds: i64) -> DeviceBindingStatus {
        match self {
            Self::BiometricOnly(inner) | Self::BiometricOrCredential(inner) => {
                inner.authenticate(timeout_seconds).await
            }
            Self::ApplicationPin(inner) => inner.authenticate(timeout_seconds),
            Self::None(_) => UnattendedAuthenticator::authenticate(),
        }
    }

    /// Signs the server challenge into the compact JWS assertion.
    ///
    /// # Errors
    ///
    /// Returns an error if assembling or signing the token fails.
    pub fn sign(
        &self,
        key_pair: &KeyPair,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expires_at: i64,
    ) -> Result<String, AssertionError> {
        sign_assertion(key_pair, kid, user_id, challenge, expires_at)
    }
}
