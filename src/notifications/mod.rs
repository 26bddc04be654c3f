//! Client-side notification subsystem.

mod listener;
mod models;
mod service;
mod store;

pub use listener::{spawn_push_listener, ListenerTask};
pub use models::Notification;
pub use service::NotificationService;
pub use store::{LoadError, NotificationStore};
