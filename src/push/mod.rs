//! Push channel infrastructure.
//!
//! One authenticated WebSocket per session carries named JSON events from the
//! server. The connection manager owns the socket; consumers subscribe to
//! event names and receive payloads without touching the transport.

mod connection;
mod messages;

pub use connection::{ConnectionHandle, ConnectionManager, PushError};
pub use messages::{event_types, system, PushMessage};
