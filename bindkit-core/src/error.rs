use thiserror::Error;

use crate::jws::AssertionError;
use crate::keys::KeyStoreError;
use crate::platform::StoreError;

/// Failure of a device-binding ceremony.
///
/// Every ceremony ends in exactly one success or one of these kinds; the
/// original platform fault is preserved as the error source where one
/// exists. [`DeviceBindingError::client_error`] yields the string mirrored
/// into the outbound wire record for server-side telemetry.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum DeviceBindingError {
    /// The policy is not satisfiable on this device. No key material was
    /// touched.
    #[error("Device not supported. Please verify the biometric or Pin settings")]
    Unsupported,
    /// The platform key store refused or failed the key-pair request.
    #[error("failed to generate the device binding key pair")]
    KeyGeneration {
        /// The underlying key store fault.
        #[source]
        source: KeyStoreError,
    },
    /// The user or the platform cancelled the ceremony.
    #[error("{message}")]
    Abort {
        /// Platform error code.
        code: i32,
        /// Cancellation reason, surfaced verbatim to the caller.
        message: String,
    },
    /// The ceremony did not resolve within the allotted window.
    #[error("Biometric Timeout")]
    Timeout,
    /// Building or signing the assertion failed after a successful ceremony.
    /// Not reachable while the signing invariants hold.
    #[error("failed to sign the challenge")]
    Signing {
        /// The underlying assertion fault.
        #[source]
        source: AssertionError,
    },
    /// Persisting the binding record failed.
    #[error("failed to persist the binding record")]
    Persistence {
        /// The underlying store fault.
        #[source]
        source: StoreError,
    },
}

impl DeviceBindingError {
    /// The `clientError` wire value reported to the server for this kind.
    #[must_use]
    pub const fn client_error(&self) -> &'static str {
        match self {
            Self::Unsupported => "Unsupported",
            Self::Timeout => "Timeout",
            Self::Abort { .. }
            | Self::KeyGeneration { .. }
            | Self::Signing { .. }
            | Self::Persistence { .. } => "Abort",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_ceremony_messages() {
        assert_eq!(DeviceBindingError::Timeout.to_string(), "Biometric Timeout");
        assert_eq!(
            DeviceBindingError::Unsupported.to_string(),
            "Device not supported. Please verify the biometric or Pin settings"
        );
        let abort = DeviceBindingError::Abort {
            code: -1,
            message: "invalid credential".to_string(),
        };
        assert_eq!(abort.to_string(), "invalid credential");
    }

    #[test]
    fn test_client_error_mapping() {
        assert_eq!(DeviceBindingError::Unsupported.client_error(), "Unsupported");
        assert_eq!(DeviceBindingError::Timeout.client_error(), "Timeout");
        let abort = DeviceBindingError::Abort {
            code: 3,
            message: "cancelled".to_string(),
        };
        assert_eq!(abort.client_error(), "Abort");
        let generation = DeviceBindingError::KeyGeneration {
            source: KeyStoreError::Unavailable,
        };
        assert_eq!(generation.client_error(), "Abort");
    }

    #[test]
    fn test_key_generation_preserves_cause() {
        let err = DeviceBindingError::KeyGeneration {
            source: KeyStoreError::Failure {
                message: "keystore sealed".to_string(),
            },
        };
        let source = std::error::Error::source(&err).expect("cause preserved");
        assert!(source.to_string().contains("keystore sealed"));
    }
}
