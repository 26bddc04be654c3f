//! Notification data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single notification as delivered by both the listing endpoint and the
/// push channel. `id` is the de-duplication and addressing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Push deliveries omit this; a freshly pushed notification is unread.
    #[serde(default)]
    pub read: bool,
    /// Opaque route/target reference for the presentation layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}
