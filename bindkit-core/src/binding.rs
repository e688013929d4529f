//! Binding ceremony orchestration.
//!
//! [`DeviceBindingClient::bind`] drives one end-to-end ceremony: strategy
//! selection, support check, key generation, local authentication, record
//! persistence and challenge signing. Each step is a hard sequence point —
//! a failure short-circuits everything after it, and one invocation is one
//! attempt: retrying means calling `bind` again with a fresh ceremony.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::authenticator::DeviceAuthenticator;
use crate::capability::DeviceCapabilities;
use crate::error::DeviceBindingError;
use crate::jws::SignedAssertion;
use crate::keys::{KeyPair, SecureKeyStore};
use crate::platform::AtomicBlobStore;
use crate::prompt::{PinCollector, PromptInfo, UserAuthenticationUi};
use crate::repository::BindingRepository;
use crate::wire::{DeviceBindingOutput, DeviceBindingRequest};
use crate::BindingPolicy;

/// Seconds a signed assertion stays valid after the ceremony completes.
///
/// Fixed local skew, independent of the server-declared ceremony timeout.
pub const ASSERTION_LIFETIME_SECS: i64 = 60;

/// Collaborators one ceremony runs against.
///
/// Passed explicitly into every `bind` call; the SDK keeps no process-wide
/// pointer to host state.
pub struct BindingContext {
    /// Platform secure key store.
    pub key_store: Arc<dyn SecureKeyStore>,
    /// Platform capability queries.
    pub capabilities: Arc<dyn DeviceCapabilities>,
    /// Host biometric / credential prompt.
    pub authentication_ui: Arc<dyn UserAuthenticationUi>,
    /// Host PIN entry for the application-PIN policy.
    pub pin_collector: Arc<dyn PinCollector>,
    /// Store holding PIN-wrapped keys; substitutable for tests.
    pub pin_vault: Arc<dyn AtomicBlobStore>,
}

/// Entry point for device binding ceremonies.
pub struct DeviceBindingClient {
    repository: Arc<dyn BindingRepository>,
    device_id: String,
    device_name: String,
}

impl DeviceBindingClient {
    /// Creates a client persisting bindings into `repository` and reporting
    /// this device's identifiers on the wire.
    #[must_use]
    pub fn new(
        repository: Arc<dyn BindingRepository>,
        device_id: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            device_id: device_id.into(),
            device_name: device_name.into(),
        }
    }

    /// Runs one binding ceremony.
    ///
    /// Sequence: select the strategy for `policy`, check support, generate
    /// the bound key, authenticate locally within `timeout_seconds`, persist
    /// the binding record, sign `challenge`. Exactly one outcome is
    /// produced; no step after a failure executes and nothing is partially
    /// persisted.
    ///
    /// # Errors
    ///
    /// One [`DeviceBindingError`] kind per failure point: `Unsupported`
    /// before any key material is touched, `KeyGeneration` wrapping the
    /// store fault, `Abort`/`Timeout` from the ceremony, `Persistence` and
    /// `Signing` after it.
    pub async fn bind(
        &self,
        context: &BindingContext,
        policy: BindingPolicy,
        user_id: &str,
        display_name: &str,
        challenge: &str,
        timeout_seconds: i64,
        prompt: &PromptInfo,
    ) -> Result<SignedAssertion, DeviceBindingError> {
        let authenticator =
            DeviceAuthenticator::for_policy(policy, context, prompt, user_id, timeout_seconds);

        if !authenticator.is_supported() {
            warn!("binding policy {policy} is not satisfiable on this device");
            return Err(DeviceBindingError::Unsupported);
        }

        let key_pair = authenticator
            .generate_keys()
            .map_err(|source| DeviceBindingError::KeyGeneration { source })?;
        debug!("generated bound key pair under alias {}", key_pair.key_alias);

        let unlocked = authenticator
            .authenticate(timeout_seconds)
            .await
            .into_result()?;

        let expires_at = unix_now().saturating_add(ASSERTION_LIFETIME_SECS);
        let kid = self
            .repository
            .persist(user_id, display_name, &key_pair.key_alias, policy)
            .map_err(|source| DeviceBindingError::Persistence { source })?;

        // Sign with the unlocked reference when the ceremony produced one;
        // the invariant holds either way: signing happens only after a
        // successful authentication outcome.
        let signing_pair = match unlocked {
            Some(private_key) => KeyPair {
                private_key,
                ..key_pair
            },
            None => key_pair,
        };
        match authenticator.sign(&signing_pair, &kid, user_id, challenge, expires_at) {
            Ok(jws) => {
                debug!("binding ceremony complete, kid={kid}");
                Ok(SignedAssertion {
                    jws,
                    kid,
                    expires_at,
                })
            }
            Err(source) => {
                // Roll the record back so a failed ceremony leaves nothing
                // behind.
                if let Err(rollback) = self.repository.delete(user_id) {
                    warn!("failed to roll back binding record: {rollback}");
                }
                Err(DeviceBindingError::Signing { source })
            }
        }
    }

    /// Runs a ceremony described by a parsed server callback.
    ///
    /// On success the returned output carries the JWS and this device's
    /// identifiers; map failures onto the wire with
    /// [`DeviceBindingOutput::from_error`].
    ///
    /// # Errors
    ///
    /// Propagates the ceremony failure, see [`Self::bind`].
    pub async fn bind_request(
        &self,
        context: &BindingContext,
        request: &DeviceBindingRequest,
    ) -> Result<DeviceBindingOutput, DeviceBindingError> {
        let assertion = self
            .bind(
                context,
                request.policy,
                &request.user_id,
                &request.username,
                &request.challenge,
                request.timeout_seconds,
                &request.prompt,
            )
            .await?;
        Ok(DeviceBindingOutput {
            jws: assertion.jws,
            device_name: self.device_name.clone(),
            device_id: self.device_id.clone(),
            client_error: String::new(),
        })
    }
}

/// Current unix time in seconds. A clock before the epoch reads as zero.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}
