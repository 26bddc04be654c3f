//! Transient user-facing alerts.
//!
//! Mutation failures and incoming push notifications surface to the user as
//! short-lived alerts. The sink fans them out over a broadcast channel;
//! emitting never blocks and an absent audience is fine.

use tokio::sync::broadcast;

/// Severity of a transient alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Error,
}

/// One transient alert for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            message: message.into(),
        }
    }
}

/// Fan-out for transient alerts.
///
/// Clones share the same channel; every active subscriber sees every alert.
#[derive(Clone)]
pub struct AlertSink {
    tx: broadcast::Sender<Alert>,
}

impl AlertSink {
    /// Create a sink keeping up to `capacity` undelivered alerts per
    /// subscriber before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    /// Emit an informational alert. Never blocks; alerts emitted while
    /// nobody subscribes simply evaporate.
    pub fn notify(&self, message: impl Into<String>) {
        let _ = self.tx.send(Alert::info(message));
    }

    /// Emit an error alert.
    pub fn notify_error(&self, message: impl Into<String>) {
        let _ = self.tx.send(Alert::error(message));
    }
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new(64)
    }
}
