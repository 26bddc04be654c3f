//! Notification service: bulk loading and server reconciliation.
//!
//! The store mutates synchronously; this service owns every network call
//! around it. Failures never propagate as panics, they become a log line and
//! a transient error alert.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::alerts::AlertSink;
use crate::api::NotificationApi;

use super::store::{LoadError, NotificationStore};

/// Coordinates the notification store with the server.
pub struct NotificationService {
    store: Arc<NotificationStore>,
    api: Arc<dyn NotificationApi>,
    alerts: AlertSink,
}

impl NotificationService {
    pub fn new(
        store: Arc<NotificationStore>,
        api: Arc<dyn NotificationApi>,
        alerts: AlertSink,
    ) -> Self {
        Self { store, api, alerts }
    }

    /// Fetch the notification backlog once and seed the store.
    ///
    /// Returns the unread count as derived by the store. On fetch failure the
    /// store stays as it was (empty at startup) and the count reads zero;
    /// there is no automatic retry.
    pub async fn load_initial(&self) -> usize {
        let records = match self.api.list_notifications().await {
            Ok(records) => records,
            Err(err) => {
                warn!("Failed to fetch notification backlog: {err}");
                return self.store.unread_count();
            }
        };

        match self.store.load(records) {
            Ok(unread) => {
                debug!("Seeded notification store, {unread} unread");
                unread
            }
            Err(LoadError::AlreadySeeded) => {
                warn!("Ignoring duplicate notification backlog load");
                self.store.unread_count()
            }
        }
    }

    /// Mark every notification as read.
    ///
    /// The store is flipped before the request resolves so the surface
    /// updates instantly. A failed request leaves the optimistic state in
    /// place; the server stays authoritative for the next session.
    pub async fn mark_all_read(&self) {
        // 1. Nothing unread means nothing to do, and no request either.
        if self.store.unread_count() == 0 {
            debug!("Mark-all-read skipped, nothing unread");
            return;
        }

        // 2. Optimistic local flip.
        let flipped = self.store.mark_all_read();

        // 3. Reconcile with the server.
        match self.api.mark_all_read().await {
            Ok(()) => debug!("Marked {flipped} notifications read"),
            Err(err) => {
                warn!("Mark-all-read request failed, keeping local flags: {err}");
                self.alerts
                    .notify_error("Could not mark notifications as read");
            }
        }
    }

    /// Delete one notification.
    ///
    /// The store is only touched after the server confirms, so a failed
    /// request leaves the record visible.
    pub async fn delete(&self, id: &str) {
        match self.api.delete_notification(id).await {
            Ok(()) => {
                if self.store.delete_by_id(id) {
                    debug!("Deleted notification {id}");
                } else {
                    debug!("Notification {id} was already gone locally");
                }
            }
            Err(err) => {
                warn!("Delete request for notification {id} failed: {err}");
                self.alerts.notify_error("Could not delete notification");
            }
        }
    }
}
