//! Push connection manager.
//!
//! Owns at most one persistent, authenticated WebSocket to the server per
//! session. Other components subscribe to named push events without touching
//! the transport; a reader task parses inbound envelopes and routes payloads
//! to subscribers in arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{event_types, system, PushMessage};

/// Error type for push channel operations.
#[derive(Debug, Error)]
pub enum PushError {
    /// The WebSocket handshake (or the request built for it) failed.
    #[error("push handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
    /// The token cannot be carried in an HTTP header.
    #[error("session token is not a valid header value")]
    InvalidToken,
    /// The presented handle belongs to a torn-down connection.
    #[error("connection handle is no longer active")]
    StaleHandle,
}

/// Identifies one established push channel.
///
/// Every successful `connect` yields a fresh handle; operations presented
/// with a handle from a replaced or torn-down connection are rejected, which
/// keeps stale subscribers from ever receiving events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    id: u64,
}

/// Routes inbound payloads to the subscriber of each named event.
struct EventRouter {
    routes: RwLock<HashMap<String, mpsc::Sender<serde_json::Value>>>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber for an event name.
    ///
    /// If the event already has a subscriber, the old sender is dropped and
    /// its receiver closes (drop-and-replace behavior).
    async fn subscribe(&self, event: &str) -> mpsc::Receiver<serde_json::Value> {
        let (tx, rx) = mpsc::channel(32);
        let mut routes = self.routes.write().await;
        routes.insert(event.to_string(), tx);
        rx
    }

    async fn unsubscribe(&self, event: &str) {
        let mut routes = self.routes.write().await;
        routes.remove(event);
    }

    /// Deliver a payload to the event's subscriber, if any.
    ///
    /// A full subscriber channel back-pressures the caller instead of
    /// dropping the event. Returns `false` when nobody was listening.
    async fn route(&self, event: &str, payload: serde_json::Value) -> bool {
        let sender = {
            let routes = self.routes.read().await;
            routes.get(event).cloned()
        };
        let Some(sender) = sender else {
            return false;
        };
        if sender.send(payload).await.is_err() {
            // Receiver went away without unsubscribing; drop the route
            // unless a replacement already took its place.
            let mut routes = self.routes.write().await;
            if routes
                .get(event)
                .is_some_and(|current| current.same_channel(&sender))
            {
                routes.remove(event);
            }
            return false;
        }
        true
    }

    async fn clear(&self) {
        let mut routes = self.routes.write().await;
        routes.clear();
    }
}

struct ActiveConnection {
    handle: ConnectionHandle,
    router: Arc<EventRouter>,
    reader: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Manages the session's push channel.
///
/// `connect` establishes the channel and publishes the new handle on a watch
/// channel so listeners can (re)acquire their subscriptions; `disconnect` is
/// idempotent and ignores stale handles. Connection failures are surfaced as
/// errors but never panic; consumers keep working without live updates.
pub struct ConnectionManager {
    ws_url: String,
    client_instance: String,
    next_handle_id: AtomicU64,
    active: Mutex<Option<ActiveConnection>>,
    handle_tx: watch::Sender<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    /// Create a manager for the given WebSocket endpoint. No connection is
    /// attempted until `connect` is called with a token.
    pub fn new(ws_url: impl Into<String>) -> Self {
        let (handle_tx, _) = watch::channel(None);
        Self {
            ws_url: ws_url.into(),
            client_instance: Uuid::new_v4().to_string(),
            next_handle_id: AtomicU64::new(1),
            active: Mutex::new(None),
            handle_tx,
        }
    }

    /// Establish the authenticated push channel.
    ///
    /// An existing connection is torn down and replaced; its handle becomes
    /// stale. On success the new handle is published to `handle_updates`
    /// subscribers.
    pub async fn connect(&self, token: &str) -> Result<ConnectionHandle, PushError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            warn!("Replacing existing push connection");
            shutdown_connection(previous).await;
        }

        let mut request = self.ws_url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| PushError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        if let Ok(instance) = HeaderValue::from_str(&self.client_instance) {
            request.headers_mut().insert("x-client-instance", instance);
        }

        let (socket, _) = connect_async(request).await?;

        let handle = ConnectionHandle {
            id: self.next_handle_id.fetch_add(1, Ordering::SeqCst),
        };
        let router = Arc::new(EventRouter::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(run_reader(
            socket,
            router.clone(),
            handle.clone(),
            self.handle_tx.clone(),
            shutdown_rx,
        ));

        *active = Some(ActiveConnection {
            handle: handle.clone(),
            router,
            reader,
            shutdown: Some(shutdown_tx),
        });
        self.handle_tx.send_replace(Some(handle.clone()));
        info!("Push channel established: {}", self.ws_url);
        Ok(handle)
    }

    /// Tear down the connection identified by `handle`.
    ///
    /// Idempotent: a stale or already-disconnected handle is a no-op.
    pub async fn disconnect(&self, handle: &ConnectionHandle) {
        let mut active = self.active.lock().await;
        if active.as_ref().map(|c| &c.handle) != Some(handle) {
            debug!("Ignoring disconnect for stale connection handle");
            return;
        }
        if let Some(connection) = active.take() {
            shutdown_connection(connection).await;
        }
        self.handle_tx.send_if_modified(|current| {
            if current.as_ref() == Some(handle) {
                *current = None;
                true
            } else {
                false
            }
        });
        info!("Push channel disconnected");
    }

    /// Subscribe to a named push event on the given handle.
    ///
    /// Subscribing to an event that already has a subscriber replaces the old
    /// one; the replaced receiver closes. Stale handles are rejected.
    pub async fn subscribe(
        &self,
        handle: &ConnectionHandle,
        event: &str,
    ) -> Result<mpsc::Receiver<serde_json::Value>, PushError> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(connection) if connection.handle == *handle => {
                Ok(connection.router.subscribe(event).await)
            }
            _ => Err(PushError::StaleHandle),
        }
    }

    /// Remove the subscriber for a named event. No-op on a stale handle.
    pub async fn unsubscribe(&self, handle: &ConnectionHandle, event: &str) {
        let active = self.active.lock().await;
        if let Some(connection) = active.as_ref() {
            if connection.handle == *handle {
                connection.router.unsubscribe(event).await;
            }
        }
    }

    /// Watch the currently valid handle. `None` means no live channel.
    pub fn handle_updates(&self) -> watch::Receiver<Option<ConnectionHandle>> {
        self.handle_tx.subscribe()
    }

    /// The currently valid handle, if a channel is up.
    pub fn current_handle(&self) -> Option<ConnectionHandle> {
        self.handle_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current_handle().is_some()
    }
}

async fn shutdown_connection(mut connection: ActiveConnection) {
    if let Some(shutdown) = connection.shutdown.take() {
        let _ = shutdown.send(());
    }
    // Give the reader a moment to send a close frame, then cut it loose.
    if tokio::time::timeout(Duration::from_secs(2), &mut connection.reader)
        .await
        .is_err()
    {
        connection.reader.abort();
    }
}

/// Reads frames until the socket ends or shutdown is requested, routing
/// event payloads in arrival order.
async fn run_reader(
    mut socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    router: Arc<EventRouter>,
    handle: ConnectionHandle,
    handle_tx: watch::Sender<Option<ConnectionHandle>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                let _ = socket.close(None).await;
                break;
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&router, &text).await,
                Some(Ok(Message::Close(_))) => {
                    info!("Push channel closed by server");
                    break;
                }
                // Ping/pong answered by the library during reads; binary
                // frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("Push channel failed, live updates stop: {err}");
                    break;
                }
                None => {
                    info!("Push channel ended");
                    break;
                }
            }
        }
    }
    router.clear().await;
    // Invalidate the handle unless a newer connection already took over.
    handle_tx.send_if_modified(|current| {
        if current.as_ref() == Some(&handle) {
            *current = None;
            true
        } else {
            false
        }
    });
}

/// Parse one inbound frame and route it. Channel-level events are consumed
/// here; everything else goes to the event's subscriber.
async fn dispatch(router: &EventRouter, text: &str) {
    let message: PushMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!("Ignoring unparseable push frame: {err}");
            return;
        }
    };
    match message.event.as_str() {
        event_types::CONNECTED => {
            match serde_json::from_value::<system::Connected>(message.payload) {
                Ok(connected) => {
                    info!("Push channel ready, server {}", connected.server_version)
                }
                Err(_) => info!("Push channel ready"),
            }
        }
        event_types::ERROR => match serde_json::from_value::<system::Error>(message.payload) {
            Ok(error) => warn!("Push channel error {}: {}", error.code, error.message),
            Err(_) => warn!("Push channel reported an error"),
        },
        event => {
            if !router.route(event, message.payload).await {
                debug!("No subscriber for push event '{event}'");
            }
        }
    }
}
