//! HTTP client implementation for the notification endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::notifications::Notification;
use crate::session::TokenProvider;

use super::models::NotificationListResponse;
use super::{ApiError, NotificationApi};

/// HTTP client for the FinSync server's notification endpoints.
///
/// The bearer token is read from the provider per request, so a token that
/// appears or rotates mid-session is picked up without rebuilding the client.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the FinSync server (e.g., "http://localhost:3000")
    /// * `timeout_sec` - Request timeout in seconds
    /// * `tokens` - Source of the session's bearer token
    pub fn new(base_url: String, timeout_sec: u64, tokens: Arc<dyn TokenProvider>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            tokens,
        }
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.tokens.bearer_token().ok_or(ApiError::MissingToken)
    }

    /// Get the base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let token = self.bearer()?;
        let url = format!("{}/api/notifications", self.base_url);
        let response = self.client.get(&url).bearer_auth(&token).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status(),
            });
        }

        let body: NotificationListResponse = response.json().await?;
        Ok(body.notifications)
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        let token = self.bearer()?;
        let url = format!("{}/api/notifications/mark-as-read", self.base_url);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn delete_notification(&self, id: &str) -> Result<(), ApiError> {
        let token = self.bearer()?;
        let url = format!("{}/api/notifications/{}", self.base_url, id);
        let response = self.client.delete(&url).bearer_auth(&token).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status(),
            });
        }
        Ok(())
    }
}
