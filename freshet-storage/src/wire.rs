//! Response envelopes of the backend wire protocol.
//!
//! Every response is a JSON object; failures put a message under
//! `error` and omit the payload fields. Shared between the remote
//! backend client and the server-side handler.

use serde::{Deserialize, Serialize};

/// Bare acknowledgement, or a failure.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorRes {
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a range read: the raw JSON events in order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventsRes {
    /// The events of the requested range.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Box<serde_json::value::RawValue>>,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a delete.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OkRes {
    /// Whether the operation took effect.
    #[serde(default)]
    pub ok: bool,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a length query.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LenRes {
    /// Current stream length.
    #[serde(default)]
    pub len: u64,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a config query.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigRes {
    /// The backend's self-describing descriptor.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a stream listing.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StreamsRes {
    /// Names of the streams the backend holds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<String>,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorRes {
    /// The success acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// A failure carrying `message`.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()) }
    }
}
