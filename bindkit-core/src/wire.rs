//! Server callback wire record.
//!
//! The authentication server describes a binding ceremony as a JSON
//! callback: an `output` array the client reads (user, policy, challenge,
//! prompt fields, timeout) and an `input` array the client fills (`jws`,
//! `deviceName`, `deviceId`, `clientError`). The parsed request is
//! immutable; outbound fields live in a separate struct merged into the
//! retained raw document at render time, so partial mutation is never the
//! source of truth. Input names carry server-side prefixes and are matched
//! by suffix.

use serde_json::Value;
use thiserror::Error;

use crate::error::DeviceBindingError;
use crate::prompt::PromptInfo;
use crate::BindingPolicy;

const CALLBACK_TYPE: &str = "DeviceBindingCallback";

/// Errors reading or rendering a callback record.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The payload is not a device binding callback.
    #[error("unrecognized callback type: {found}")]
    UnexpectedType {
        /// The `type` value found.
        found: String,
    },
    /// A required output field is absent.
    #[error("missing callback field: {name}")]
    MissingField {
        /// Name of the absent field.
        name: String,
    },
    /// The `authenticationType` value names no known policy.
    #[error("unrecognized authentication type: {value}")]
    InvalidPolicy {
        /// The offending value.
        value: String,
    },
}

/// Immutable, parsed device binding callback.
#[derive(Debug, Clone)]
pub struct DeviceBindingRequest {
    /// The user to bind.
    pub user_id: String,
    /// Display name of the user.
    pub username: String,
    /// Requested binding policy.
    pub policy: BindingPolicy,
    /// Opaque server challenge (base64), signed verbatim.
    pub challenge: String,
    /// Prompt fields shown during the ceremony.
    pub prompt: PromptInfo,
    /// Server-declared ceremony timeout in seconds.
    pub timeout_seconds: i64,
    raw: Value,
}

fn output_value<'a>(raw: &'a Value, name: &str) -> Option<&'a Value> {
    raw.get("output")?.as_array()?.iter().find_map(|entry| {
        (entry.get("name")?.as_str()? == name)
            .then(|| entry.get("value"))
            .flatten()
    })
}

fn output_str(raw: &Value, name: &str) -> Result<String, WireError> {
    output_value(raw, name)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| WireError::MissingField {
            name: name.to_string(),
        })
}

impl DeviceBindingRequest {
    /// Parses a raw callback payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not JSON, is not a
    /// `DeviceBindingCallback`, lacks a required output field, or names an
    /// unknown `authenticationType`.
    pub fn parse(json: &str) -> Result<Self, WireError> {
        let raw: Value = serde_json::from_str(json)?;
        let callback_type = raw.get("type").and_then(Value::as_str).unwrap_or_default();
        if callback_type != CALLBACK_TYPE {
            return Err(WireError::UnexpectedType {
                found: callback_type.to_string(),
            });
        }

        let policy_value = output_str(&raw, "authenticationType")?;
        let policy = policy_value
            .parse::<BindingPolicy>()
            .map_err(|_| WireError::InvalidPolicy {
                value: policy_value,
            })?;
        let timeout_seconds = output_value(&raw, "timeout")
            .and_then(|value| {
                value
                    .as_i64()
                    .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
            })
            .ok_or_else(|| WireError::MissingField {
                name: "timeout".to_string(),
            })?;

        Ok(Self {
            user_id: output_str(&raw, "userId")?,
            username: output_str(&raw, "username")?,
            policy,
            challenge: output_str(&raw, "challenge")?,
            prompt: PromptInfo::new(
                output_str(&raw, "title")?,
                output_str(&raw, "subtitle")?,
                output_str(&raw, "description")?,
            ),
            timeout_seconds,
            raw,
        })
    }

    /// Serializes the callback with the outbound fields merged in.
    ///
    /// Everything the server sent is reproduced byte-for-byte except the
    /// input entries matched by suffix (`jws`, `deviceName`, `deviceId`,
    /// `clientError`). An input entry the server did not send is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged document cannot be serialized.
    pub fn render(&self, output: &DeviceBindingOutput) -> Result<String, WireError> {
        let mut document = self.raw.clone();
        if let Some(inputs) = document.get_mut("input").and_then(Value::as_array_mut) {
            for entry in inputs {
                let Some(name) = entry.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let replacement = if name.ends_with("jws") {
                    &output.jws
                } else if name.ends_with("deviceName") {
                    &output.device_name
                } else if name.ends_with("deviceId") {
                    &output.device_id
                } else if name.ends_with("clientError") {
                    &output.client_error
                } else {
                    continue;
                };
                let replacement = Value::String(replacement.clone());
                if let Some(slot) = entry.get_mut("value") {
                    *slot = replacement;
                }
            }
        }
        serde_json::to_string(&document).map_err(WireError::from)
    }
}

/// Outbound fields of the callback, produced by the binding ceremony.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DeviceBindingOutput {
    /// The signed assertion, empty on failure.
    pub jws: String,
    /// Human-readable device name.
    pub device_name: String,
    /// Stable device identifier.
    pub device_id: String,
    /// Client error string for server telemetry; empty on success.
    pub client_error: String,
}

impl DeviceBindingOutput {
    /// Output record for a failed ceremony: only `clientError` is set.
    #[must_use]
    pub fn from_error(error: &DeviceBindingError) -> Self {
        Self {
            client_error: error.client_error().to_string(),
            ..Self::default()
        }
    }
}
