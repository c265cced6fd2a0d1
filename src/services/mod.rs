//! External collaborator module
//!
//! This module contains the notification service and the persistent state
//! store the engine talks to through narrow interfaces.

pub mod notifier;
pub mod store;

// Re-export main types
pub use notifier::{
    check_notify_send_available, DesktopNotifier, LogNotifier, NotificationHandle,
    NotificationService, Notifier,
};
pub use store::{FileStore, MemoryStore, StateStore};
