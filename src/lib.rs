//! FinSync Client Library
//!
//! Client-side notification subsystem for the FinSync expense sharing
//! server: a one-shot backlog load into a session-scoped store, live pushes
//! over an authenticated WebSocket channel, and optimistic mutations
//! reconciled against the REST API.

pub mod alerts;
pub mod api;
pub mod config;
pub mod notifications;
pub mod push;
pub mod session;

// Re-export commonly used types for convenience
pub use alerts::{Alert, AlertLevel, AlertSink};
pub use api::{ApiClient, ApiError, NotificationApi};
pub use config::{ClientConfig, CliConfig, FileConfig};
pub use notifications::{Notification, NotificationService, NotificationStore};
pub use push::{ConnectionHandle, ConnectionManager};
pub use session::{ClientSession, StaticTokenProvider, TokenProvider};
