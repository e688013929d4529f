//! Capability probing for binding policies.
//!
//! The probe answers "can this device satisfy the chosen policy right now"
//! and, as a side effect, remembers the strongest authenticator class that
//! satisfied it so key generation and the prompt can request that class.

use std::sync::{Arc, Mutex};

use crate::keys::{AuthenticatorClass, AuthenticatorClassSet};

/// Platform capability queries consumed by the probe.
///
/// Implementations wrap the host's biometric manager / keyguard facilities.
/// Each query is an independent positive signal: returning `false` from one
/// never overrides a `true` from another.
pub trait DeviceCapabilities: Send + Sync {
    /// Whether the device can run a ceremony for the given class set.
    fn has_biometric_capability(&self, classes: AuthenticatorClassSet) -> bool;

    /// Whether a fingerprint sensor is present with enrolled fingerprints.
    ///
    /// Older devices report enrollment here without exposing class
    /// information.
    fn has_enrolled_fingerprint(&self) -> bool;

    /// Whether a device credential (PIN, pattern, password) is configured.
    fn has_device_credential(&self) -> bool;
}

/// Probes device capability for a policy and records the class to request.
pub struct CapabilityProbe {
    capabilities: Arc<dyn DeviceCapabilities>,
    selected: Mutex<Option<AuthenticatorClass>>,
}

impl CapabilityProbe {
    /// Creates a probe over the given platform capabilities.
    #[must_use]
    pub fn new(capabilities: Arc<dyn DeviceCapabilities>) -> Self {
        Self {
            capabilities,
            selected: Mutex::new(None),
        }
    }

    /// Whether a biometric-only ceremony is currently satisfiable.
    ///
    /// Strong capability wins over weak when both are present; a bare
    /// enrolled fingerprint counts as weak.
    #[must_use]
    pub fn supports_biometric_only(&self) -> bool {
        if self
            .capabilities
            .has_biometric_capability(AuthenticatorClassSet::STRONG_BIOMETRIC)
        {
            self.select(AuthenticatorClass::Strong);
            return true;
        }
        if self
            .capabilities
            .has_biometric_capability(AuthenticatorClassSet::WEAK_BIOMETRIC)
        {
            self.select(AuthenticatorClass::Weak);
            return true;
        }
        if self.capabilities.has_enrolled_fingerprint() {
            self.select(AuthenticatorClass::Weak);
            return true;
        }
        false
    }

    /// Whether a biometric-or-device-credential ceremony is satisfiable.
    ///
    /// Evaluates the same three biometric signals as
    /// [`Self::supports_biometric_only`], then accepts an enrolled device
    /// credential as a fourth signal. Device-credential-only satisfaction
    /// selects no biometric class.
    #[must_use]
    pub fn supports_biometric_or_credential(&self) -> bool {
        if self.supports_biometric_only() {
            return true;
        }
        self.capabilities.has_device_credential()
    }

    /// The class recorded by the last successful support check, if any.
    #[must_use]
    pub fn selected_class(&self) -> Option<AuthenticatorClass> {
        self.selected.lock().map_or(None, |guard| *guard)
    }

    fn select(&self, class: AuthenticatorClass) {
        if let Ok(mut guard) = self.selected.lock() {
            *guard = Some(class);
        }
    }
}

/// Fixed capability answers, for hosts without runtime probing and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCapabilities {
    /// Device reports class-3 biometric capability.
    pub strong_biometric: bool,
    /// Device reports class-2 biometric capability.
    pub weak_biometric: bool,
    /// A fingerprint sensor exists with enrolled fingerprints.
    pub enrolled_fingerprint: bool,
    /// A device credential is configured.
    pub device_credential: bool,
}

impl DeviceCapabilities for StaticCapabilities {
    fn has_biometric_capability(&self, classes: AuthenticatorClassSet) -> bool {
        (classes.contains(AuthenticatorClassSet::STRONG_BIOMETRIC) && self.strong_biometric)
            || (classes.contains(AuthenticatorClassSet::WEAK_BIOMETRIC) && self.weak_biometric)
            || (classes.contains(AuthenticatorClassSet::DEVICE_CREDENTIAL)
                && self.device_credential)
    }

    fn has_enrolled_fingerprint(&self) -> bool {
        self.enrolled_fingerprint
    }

    fn has_device_credential(&self) -> bool {
        self.device_credential
    }
}
