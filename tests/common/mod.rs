//! Helpers shared by the integration tests

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use interval_timer::{
    services::{NotificationHandle, NotificationService},
    state::NotificationMessage,
};

/// Notification service that records deliveries and cancellations
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    next_handle: AtomicU64,
    delivered: Mutex<Vec<NotificationMessage>>,
    cancelled: Mutex<Vec<NotificationHandle>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<NotificationMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.delivered().into_iter().map(|m| m.title).collect()
    }

    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl NotificationService for RecordingNotifier {
    fn deliver_now(&self, title: &str, body: &str) -> Result<NotificationHandle, String> {
        self.delivered
            .lock()
            .unwrap()
            .push(NotificationMessage::new(title, body));
        Ok(NotificationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1))
    }

    fn cancel(&self, handle: NotificationHandle) {
        self.cancelled.lock().unwrap().push(handle);
    }
}
