//! Session wiring.
//!
//! A [`ClientSession`] owns all per-login state: the notification store, the
//! alert sink, the push connection manager and the listener task. Nothing is
//! global; logging out drops the session and with it every piece of state it
//! created.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::alerts::AlertSink;
use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::notifications::{
    spawn_push_listener, ListenerTask, NotificationService, NotificationStore,
};
use crate::push::{ConnectionHandle, ConnectionManager};

/// Source of the bearer token for API and push authentication.
///
/// The token is read per use rather than captured once, so integrations that
/// refresh tokens mid-session only need to update their provider.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Token provider backed by a fixed value, as resolved from CLI or config.
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A provider with no token. Requests fail before touching the network
    /// and no push connection is attempted.
    pub fn logged_out() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// One client session against a FinSync server.
pub struct ClientSession {
    store: Arc<NotificationStore>,
    alerts: AlertSink,
    notifications: Arc<NotificationService>,
    connections: Arc<ConnectionManager>,
    listener: Option<ListenerTask>,
    connection: Option<ConnectionHandle>,
}

impl ClientSession {
    /// Build the session components and bring the session up.
    ///
    /// Startup is best-effort past construction: a failed backlog fetch
    /// leaves the store empty, a failed push connect leaves the session
    /// REST-only. Both log a warning instead of failing the session, and the
    /// listener is spawned regardless so it attaches if a connection appears
    /// later.
    pub async fn start(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        let store = Arc::new(NotificationStore::new());
        let alerts = AlertSink::default();
        let api = Arc::new(ApiClient::new(
            config.base_url.clone(),
            config.request_timeout_sec,
            tokens.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(
            store.clone(),
            api,
            alerts.clone(),
        ));
        let connections = Arc::new(ConnectionManager::new(config.ws_url()));

        let mut connection = None;
        match tokens.bearer_token() {
            Some(token) => {
                let unread = notifications.load_initial().await;
                info!("Notification backlog loaded, {} unread", unread);

                match connections.connect(&token).await {
                    Ok(handle) => connection = Some(handle),
                    Err(err) => {
                        warn!("Live updates unavailable: {err}");
                    }
                }
            }
            None => {
                debug!("No bearer token, session starts idle");
            }
        }

        let listener = spawn_push_listener(store.clone(), alerts.clone(), connections.clone());

        Self {
            store,
            alerts,
            notifications,
            connections,
            listener: Some(listener),
            connection,
        }
    }

    /// Tear the session down: stop the listener, close the push connection
    /// and empty the store. The store stays sealed afterwards, so a backlog
    /// response still in flight cannot repopulate a dead session.
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop();
        }
        if let Some(handle) = self.connections.current_handle() {
            self.connections.disconnect(&handle).await;
        }
        self.store.clear();
        info!("Session shut down");
    }

    pub fn store(&self) -> Arc<NotificationStore> {
        self.store.clone()
    }

    pub fn notifications(&self) -> Arc<NotificationService> {
        self.notifications.clone()
    }

    pub fn alerts(&self) -> AlertSink {
        self.alerts.clone()
    }

    pub fn connections(&self) -> Arc<ConnectionManager> {
        self.connections.clone()
    }

    /// Handle of the push connection established at startup, if any.
    pub fn connection_handle(&self) -> Option<ConnectionHandle> {
        self.connection.clone()
    }
}
