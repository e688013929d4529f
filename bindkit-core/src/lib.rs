#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! Device binding SDK core.
//!
//! Proves to an authentication server that a known user is operating from a
//! known device: a key pair is generated on the device under a chosen
//! local-authentication policy, the policy's ceremony unlocks it, and the
//! server challenge is signed into a verifiable JWS assertion. A companion
//! registry manages locally registered WebAuthn-style credential sources.
//!
//! Start at [`binding::DeviceBindingClient`] for the ceremony and
//! [`registry::CredentialRegistry`] for credential bookkeeping. Platform
//! concerns — the secure key store, biometric prompt, capability queries and
//! persistence — enter through the traits on [`binding::BindingContext`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The local-authentication policy protecting a bound device key.
///
/// Wire values follow the server's `authenticationType` field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum BindingPolicy {
    /// Strong or weak biometric only.
    #[strum(serialize = "BIOMETRIC_ONLY")]
    #[serde(rename = "BIOMETRIC_ONLY")]
    BiometricOnly,
    /// Biometric with device-credential fallback.
    #[strum(serialize = "BIOMETRIC_ALLOW_FALLBACK")]
    #[serde(rename = "BIOMETRIC_ALLOW_FALLBACK")]
    BiometricOrCredential,
    /// Key wrapped under an application PIN.
    #[strum(serialize = "APPLICATION_PIN")]
    #[serde(rename = "APPLICATION_PIN")]
    ApplicationPin,
    /// No local authentication.
    #[strum(serialize = "NONE")]
    #[serde(rename = "NONE")]
    None,
}

pub mod authenticator;
pub mod binding;
pub mod capability;
pub mod ceremony;
pub mod jws;
pub mod keys;
pub mod logger;
pub mod platform;
pub mod prompt;
pub mod registry;
pub mod repository;
pub mod wire;

mod error;
pub use error::DeviceBindingError;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("bindkit_core");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_wire_names_round_trip() {
        let cases = [
            (BindingPolicy::BiometricOnly, "BIOMETRIC_ONLY"),
            (
                BindingPolicy::BiometricOrCredential,
                "BIOMETRIC_ALLOW_FALLBACK",
            ),
            (BindingPolicy::ApplicationPin, "APPLICATION_PIN"),
            (BindingPolicy::None, "NONE"),
        ];
        for (policy, wire) in cases {
            assert_eq!(policy.to_string(), wire);
            assert_eq!(wire.parse::<BindingPolicy>().unwrap(), policy);
        }
        assert!("FINGERPRINT".parse::<BindingPolicy>().is_err());
    }
}
