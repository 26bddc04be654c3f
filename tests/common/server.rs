//! Test server lifecycle management
//!
//! This module manages spawning and shutting down mock FinSync servers.
//! Each test gets an isolated server on a random port exposing the
//! notification REST endpoints and the push WebSocket, with inspectable
//! state so tests can assert exactly what the client sent.

use super::constants::*;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, put};
use axum::Router;
use futures::{SinkExt, StreamExt};
use http::header;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Shared, inspectable state of the mock server.
struct MockState {
    /// Backlog served by GET /api/notifications.
    notifications: Mutex<Vec<Value>>,
    mark_read_calls: AtomicUsize,
    delete_calls: Mutex<Vec<String>>,
    fail_mark_read: AtomicBool,
    fail_delete: AtomicBool,
    /// Sender feeding frames to the most recently connected push client.
    push_tx: Mutex<Option<mpsc::Sender<String>>>,
    /// Total push connections ever accepted (monotonic).
    push_registrations: AtomicUsize,
}

/// Mock FinSync server instance
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    state: Arc<MockState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new mock server on a random port and waits for it to be
    /// ready. The backlog starts empty; seed it before starting a client.
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState {
            notifications: Mutex::new(Vec::new()),
            mark_read_calls: AtomicUsize::new(0),
            delete_calls: Mutex::new(Vec::new()),
            fail_mark_read: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            push_tx: Mutex::new(None),
            push_registrations: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/notifications", get(list_notifications))
            .route("/api/notifications/mark-as-read", put(mark_as_read))
            .route("/api/notifications/{id}", delete(delete_notification))
            .route("/api/ws", get(ws_handler))
            .with_state(state.clone());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Set the backlog returned by GET /api/notifications.
    pub fn seed_notifications(&self, records: Vec<Value>) {
        *self.state.notifications.lock().unwrap() = records;
    }

    /// How many times the client called PUT /api/notifications/mark-as-read.
    pub fn mark_read_calls(&self) -> usize {
        self.state.mark_read_calls.load(Ordering::SeqCst)
    }

    /// The ids the client sent DELETE requests for, in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.state.delete_calls.lock().unwrap().clone()
    }

    /// Make PUT /api/notifications/mark-as-read answer 500.
    pub fn set_fail_mark_read(&self, fail: bool) {
        self.state.fail_mark_read.store(fail, Ordering::SeqCst);
    }

    /// Make DELETE /api/notifications/{id} answer 500.
    pub fn set_fail_delete(&self, fail: bool) {
        self.state.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Send a push event to the currently connected client.
    ///
    /// # Panics
    ///
    /// Panics if no client holds an open push connection.
    pub async fn push(&self, event: &str, payload: Value) {
        let frame = serde_json::json!({"type": event, "payload": payload}).to_string();
        self.push_raw(frame).await;
    }

    /// Send a raw frame on the push connection, bypassing the envelope.
    pub async fn push_raw(&self, frame: String) {
        let tx = self
            .state
            .push_tx
            .lock()
            .unwrap()
            .clone()
            .expect("No push connection to send to");
        tx.send(frame).await.expect("Push connection closed");
    }

    /// Wait until the total number of accepted push connections reaches
    /// `count`. The counter is monotonic, so this also works across a
    /// reconnect.
    pub async fn wait_for_push_connections(&self, count: usize) {
        wait_for(
            || self.state.push_registrations.load(Ordering::SeqCst) >= count,
            "push connection",
        )
        .await;
    }

    /// Waits for the server to answer HTTP at all.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            // Any response at all means the listener is up.
            if client
                .get(format!("{}/api/notifications", self.base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Poll until `condition` holds, panicking after a timeout.
pub async fn wait_for<F: Fn() -> bool>(condition: F, what: &str) {
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(CONDITION_TIMEOUT_MS);
    while !condition() {
        if start.elapsed() > timeout {
            panic!(
                "Timed out after {}ms waiting for {}",
                CONDITION_TIMEOUT_MS, what
            );
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Push `event` repeatedly until `visible` reports it landed.
///
/// The client drops pushes that arrive before its listener subscribes and
/// absorbs duplicate ids after it, so repeating the same event until it shows
/// up is race-free.
pub async fn push_until_visible<F: Fn() -> bool>(
    server: &TestServer,
    event: &str,
    payload: Value,
    visible: F,
) {
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(CONDITION_TIMEOUT_MS);
    loop {
        server.push(event, payload.clone()).await;
        if visible() {
            return;
        }
        if start.elapsed() > timeout {
            panic!(
                "Timed out after {}ms waiting for push '{}' to land",
                CONDITION_TIMEOUT_MS, event
            );
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        if visible() {
            return;
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", TEST_TOKEN);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == expected)
        .unwrap_or(false)
}

async fn list_notifications(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let notifications = state.notifications.lock().unwrap().clone();
    Json(serde_json::json!({ "notifications": notifications })).into_response()
}

async fn mark_as_read(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    state.mark_read_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_mark_read.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    {
        let mut notifications = state.notifications.lock().unwrap();
        for record in notifications.iter_mut() {
            record["read"] = Value::Bool(true);
        }
    }
    Json(serde_json::json!({})).into_response()
}

async fn delete_notification(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    state.delete_calls.lock().unwrap().push(id.clone());
    if state.fail_delete.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let mut notifications = state.notifications.lock().unwrap();
    notifications.retain(|record| record["id"] != id.as_str());
    StatusCode::OK.into_response()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established push connection: greet, register the outgoing
/// channel (drop-and-replace), forward pushed frames until the client leaves.
async fn handle_socket(socket: WebSocket, state: Arc<MockState>) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let connected = serde_json::json!({
        "type": "connected",
        "payload": { "server_version": "mock" }
    })
    .to_string();
    if ws_sink.send(Message::Text(connected.into())).await.is_err() {
        return;
    }

    let (push_tx, mut push_rx) = mpsc::channel::<String>(32);
    *state.push_tx.lock().unwrap() = Some(push_tx);
    state.push_registrations.fetch_add(1, Ordering::SeqCst);

    // Forward frames from the test to the WebSocket.
    let forward = tokio::spawn(async move {
        while let Some(text) = push_rx.recv().await {
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    forward.abort();
}
