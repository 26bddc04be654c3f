//! Push channel message types.
//!
//! Every frame on the push channel is a JSON envelope with a `type` used for
//! routing and a free-form JSON payload, validated into a concrete shape only
//! at the consuming boundary.

use serde::{Deserialize, Serialize};

/// Server -> client push envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    /// Event name used for routing (e.g. "connected", "new_notification").
    #[serde(rename = "type")]
    pub event: String,
    /// Event-specific payload (JSON value).
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PushMessage {
    /// Create an envelope with the given event name and payload.
    pub fn new(event: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            event: event.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Reserved event name constants.
pub mod event_types {
    /// Sent by the server right after the channel is established.
    pub const CONNECTED: &str = "connected";
    /// One notification record per event; the event the core subscribes to.
    pub const NEW_NOTIFICATION: &str = "new_notification";
    /// Server-reported problem on the channel.
    pub const ERROR: &str = "error";
}

/// Channel-level payloads (not notification-specific).
pub mod system {
    use serde::{Deserialize, Serialize};

    /// Payload of the `connected` greeting.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Connected {
        pub server_version: String,
    }

    /// Payload of an `error` frame.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }
}
