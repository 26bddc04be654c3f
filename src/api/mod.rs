//! REST client for the FinSync notification endpoints.

mod client;
mod models;

use async_trait::async_trait;
use thiserror::Error;

use crate::notifications::Notification;

pub use client::ApiClient;
pub use models::NotificationListResponse;

/// Error type for notification API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No bearer token is available (logged out).
    #[error("no session token available")]
    MissingToken,
    /// Transport or body decoding failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned status {status}")]
    Status { status: reqwest::StatusCode },
}

/// The notification endpoints the core depends on.
///
/// `ApiClient` is the real implementation; tests drive the service layer
/// with doubles behind this seam.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch the notification backlog, newest-first.
    async fn list_notifications(&self) -> Result<Vec<Notification>, ApiError>;

    /// Flag every notification as read. Idempotent on the server.
    async fn mark_all_read(&self) -> Result<(), ApiError>;

    /// Delete one notification by id.
    async fn delete_notification(&self, id: &str) -> Result<(), ApiError>;
}
