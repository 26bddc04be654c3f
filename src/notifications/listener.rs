//! Push listener.
//!
//! A background task that subscribes to the `new_notification` push event,
//! inserts each delivered record into the store, and raises a transient alert
//! for it. The task follows the connection manager's handle: it waits while
//! disconnected, subscribes when a handle appears, and migrates (releasing
//! the old subscription) when the handle is replaced.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::alerts::AlertSink;
use crate::push::{event_types, ConnectionManager};

use super::models::Notification;
use super::store::NotificationStore;

/// Handle for the spawned listener task.
pub struct ListenerTask {
    task: JoinHandle<()>,
}

impl ListenerTask {
    /// Stop the listener. Its subscription dies with it and is reaped by the
    /// router on the next delivery attempt.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the listener task for one session.
///
/// Safe to call before any connection exists; the task subscribes as soon as
/// a handle becomes available. Only one subscription is ever active: the task
/// unsubscribes before re-acquiring, and the router's drop-and-replace closes
/// anything it might have missed.
pub fn spawn_push_listener(
    store: Arc<NotificationStore>,
    alerts: AlertSink,
    connections: Arc<ConnectionManager>,
) -> ListenerTask {
    let mut handles = connections.handle_updates();
    let task = tokio::spawn(async move {
        loop {
            let current = handles.borrow_and_update().clone();
            let Some(handle) = current else {
                // Not connected; wait for a handle.
                if handles.changed().await.is_err() {
                    return;
                }
                continue;
            };

            let mut events = match connections
                .subscribe(&handle, event_types::NEW_NOTIFICATION)
                .await
            {
                Ok(events) => events,
                Err(_) => {
                    // The handle went stale between observing and
                    // subscribing; pick up the replacement.
                    if handles.changed().await.is_err() {
                        return;
                    }
                    continue;
                }
            };
            debug!("Push listener subscribed to '{}'", event_types::NEW_NOTIFICATION);

            loop {
                tokio::select! {
                    payload = events.recv() => match payload {
                        Some(payload) => deliver(&store, &alerts, payload),
                        None => {
                            debug!("Push subscription closed");
                            break;
                        }
                    },
                    changed = handles.changed() => {
                        connections
                            .unsubscribe(&handle, event_types::NEW_NOTIFICATION)
                            .await;
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }
        }
    });
    ListenerTask { task }
}

/// Apply one pushed payload: validate, insert, alert. Insert and alert are
/// back to back with no await between them, so the alert always reflects the
/// record just inserted.
fn deliver(store: &NotificationStore, alerts: &AlertSink, payload: serde_json::Value) {
    let record: Notification = match serde_json::from_value(payload) {
        Ok(record) => record,
        Err(err) => {
            warn!("Dropping malformed push notification: {err}");
            return;
        }
    };
    let message = record.message.clone();
    if store.insert_pushed(record) {
        alerts.notify(message);
    } else {
        debug!("Duplicate push notification suppressed");
    }
}
