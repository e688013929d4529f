//! Prompt description and the host UI seams.
//!
//! The SDK never renders UI. Hosts implement [`UserAuthenticationUi`] over
//! their biometric prompt and [`PinCollector`] over their passphrase entry;
//! both are one-shot collaborators scoped to a single ceremony.

use secrecy::SecretString;

use crate::ceremony::AuthenticationListener;

/// Human-readable prompt fields supplied by the server challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PromptInfo {
    /// Prompt title.
    pub title: String,
    /// Prompt subtitle.
    pub subtitle: String,
    /// Longer description shown under the subtitle.
    pub description: String,
}

impl PromptInfo {
    /// Creates a prompt from its three display fields.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            description: description.into(),
        }
    }
}

/// Host-provided local-authentication prompt.
///
/// `present` starts the platform ceremony and returns immediately; the
/// outcome arrives later through the listener, possibly from a different
/// execution context. The listener is single-use.
pub trait UserAuthenticationUi: Send + Sync {
    /// Presents the authentication prompt for one ceremony.
    fn present(&self, prompt: &PromptInfo, listener: AuthenticationListener);
}

/// Host-provided passphrase entry for the application-PIN policy.
pub trait PinCollector: Send + Sync {
    /// Prompts the user for their PIN. `None` means entry was dismissed.
    fn request_pin(&self, prompt: &PromptInfo) -> Option<SecretString>;
}
