//! One-shot ceremony plumbing.
//!
//! A local-authentication ceremony is resolved exactly once: either the
//! platform callback delivers an outcome or the local timer fires first.
//! Whichever loses the race is discarded — the one-shot channel drops late
//! signals on the floor.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::DeviceBindingError;
use crate::keys::PrivateKeyRef;

/// Abort code used when the ceremony ends without a platform error code.
pub const ABORT_CODE_CANCELED: i32 = -1;

/// Message attached to aborts the user triggered by dismissing the prompt.
pub const ABORT_MESSAGE_USER_TERMINATED: &str = "User Terminates the Authentication";

/// Message attached to aborts caused by an unrecognized credential.
pub const ABORT_MESSAGE_INVALID_CREDENTIAL: &str = "invalid credential";

/// Terminal outcome of one local-authentication ceremony.
#[derive(Debug, Clone)]
pub enum DeviceBindingStatus {
    /// The ceremony succeeded. Carries the unlocked private key reference
    /// when the platform hands one back; `None` when the key generated for
    /// the ceremony is already usable.
    Success {
        /// Unlocked key reference, if the ceremony produced one.
        key: Option<PrivateKeyRef>,
    },
    /// The user or the platform cancelled the ceremony.
    Abort {
        /// Platform error code.
        code: i32,
        /// Human-readable cancellation reason.
        message: String,
    },
    /// The ceremony did not resolve within the allotted window.
    Timeout,
    /// The policy is not satisfiable on this device.
    Unsupported,
}

impl DeviceBindingStatus {
    /// Converts the outcome into the orchestrator's result, yielding the
    /// unlocked key reference on success.
    ///
    /// # Errors
    ///
    /// Maps `Abort`, `Timeout` and `Unsupported` onto the corresponding
    /// [`DeviceBindingError`] kind.
    pub fn into_result(self) -> Result<Option<PrivateKeyRef>, DeviceBindingError> {
        match self {
            Self::Success { key } => Ok(key),
            Self::Abort { code, message } => {
                Err(DeviceBindingError::Abort { code, message })
            }
            Self::Timeout => Err(DeviceBindingError::Timeout),
            Self::Unsupported => Err(DeviceBindingError::Unsupported),
        }
    }
}

/// One-shot handle through which a host UI reports the ceremony outcome.
///
/// Both delivery methods consume the listener; a ceremony can only ever be
/// resolved once. Dropping the listener without resolving it surfaces a
/// user-terminated abort to the waiting ceremony.
#[derive(Debug)]
pub struct AuthenticationListener {
    sender: oneshot::Sender<DeviceBindingStatus>,
}

impl AuthenticationListener {
    /// Creates a listener and the receiving half the ceremony awaits.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<DeviceBindingStatus>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Reports success, optionally with the unlocked key reference.
    pub fn on_success(self, key: Option<PrivateKeyRef>) {
        // A receiver that already timed out is gone; the late signal is
        // intentionally discarded.
        let _ = self.sender.send(DeviceBindingStatus::Success { key });
    }

    /// Reports a cancelled or failed ceremony.
    pub fn on_error(self, code: i32, message: impl Into<String>) {
        let _ = self.sender.send(DeviceBindingStatus::Abort {
            code,
            message: message.into(),
        });
    }
}

/// Awaits a ceremony outcome, racing it against the timeout window.
///
/// A non-positive `timeout_seconds` reports [`DeviceBindingStatus::Timeout`]
/// immediately — the deterministic way to force the timeout branch. A
/// receiver whose listener was dropped unresolved yields a user-terminated
/// abort.
pub(crate) async fn await_ceremony(
    receiver: oneshot::Receiver<DeviceBindingStatus>,
    timeout_seconds: i64,
) -> DeviceBindingStatus {
    let Ok(window) = u64::try_from(timeout_seconds) else {
        return DeviceBindingStatus::Timeout;
    };
    if window == 0 {
        return DeviceBindingStatus::Timeout;
    }
    match tokio::time::timeout(Duration::from_secs(window), receiver).await {
        Ok(Ok(status)) => status,
        Ok(Err(_)) => DeviceBindingStatus::Abort {
            code: ABORT_CODE_CANCELED,
            message: ABORT_MESSAGE_USER_TERMINATED.to_string(),
        },
        Err(_) => DeviceBindingStatus::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_negative_timeout_resolves_immediately() {
        let (_listener, receiver) = AuthenticationListener::channel();
        let status = await_ceremony(receiver, -100).await;
        assert!(matches!(status, DeviceBindingStatus::Timeout));
    }

    #[tokio::test]
    async fn test_success_delivery_wins_the_race() {
        let (listener, receiver) = AuthenticationListener::channel();
        listener.on_success(None);
        let status = await_ceremony(receiver, 60).await;
        assert!(matches!(status, DeviceBindingStatus::Success { key: None }));
    }

    #[tokio::test]
    async fn test_dropped_listener_surfaces_user_abort() {
        let (listener, receiver) = AuthenticationListener::channel();
        drop(listener);
        let status = await_ceremony(receiver, 60).await;
        match status {
            DeviceBindingStatus::Abort { code, message } => {
                assert_eq!(code, ABORT_CODE_CANCELED);
                assert_eq!(message, ABORT_MESSAGE_USER_TERMINATED);
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_when_ceremony_never_resolves() {
        let (listener, receiver) = AuthenticationListener::channel();
        let status = await_ceremony(receiver, 5).await;
        assert!(matches!(status, DeviceBindingStatus::Timeout));
        // The late resolution after the timer won is discarded, not an error.
        listener.on_success(None);
    }

    #[tokio::test]
    async fn test_error_delivery_carries_code_and_message() {
        let (listener, receiver) = AuthenticationListener::channel();
        listener.on_error(7, "sensor busy");
        match await_ceremony(receiver, 60).await {
            DeviceBindingStatus::Abort { code, message } => {
                assert_eq!(code, 7);
                assert_eq!(message, "sensor busy");
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_into_result_maps_terminal_states() {
        assert!(DeviceBindingStatus::Success { key: None }
            .into_result()
            .is_ok());
        assert!(matches!(
            DeviceBindingStatus::Timeout.into_result(),
            Err(DeviceBindingError::Timeout)
        ));
        assert!(matches!(
            DeviceBindingStatus::Unsupported.into_result(),
            Err(DeviceBindingError::Unsupported)
        ));
        let err = DeviceBindingStatus::Abort {
            code: -1,
            message: ABORT_MESSAGE_INVALID_CREDENTIAL.to_string(),
        }
        .into_result()
        .unwrap_err();
        assert_eq!(err.to_string(), ABORT_MESSAGE_INVALID_CREDENTIAL);
    }
}
