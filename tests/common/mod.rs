//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests:
//! a mock FinSync server exposing the notification REST endpoints and the
//! push WebSocket, payload builders, and polling helpers. Tests should only
//! import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{backlog_notification, TestServer};
//!
//! #[tokio::test]
//! async fn test_backlog() {
//!     let server = TestServer::spawn().await;
//!     server.seed_notifications(vec![backlog_notification("n-1", "hello", false)]);
//!     // ... start a client against server.base_url
//! }
//! ```

mod server;

// Public API - this is what tests import; not every test binary uses
// every helper.
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{backlog_notification, linked_notification, pushed_notification};
#[allow(unused_imports)]
pub use server::{push_until_visible, wait_for, TestServer};
