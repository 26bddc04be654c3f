//! Wire shapes for the notification endpoints.

use serde::{Deserialize, Serialize};

use crate::notifications::Notification;

/// Body of `GET /api/notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
}
