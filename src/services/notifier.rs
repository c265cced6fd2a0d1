//! Notification delivery
//!
//! The engine only needs "deliver now" and "cancel". Delivery is fire and
//! forget: a failure is logged and dropped so it can never stall the timer.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::state::NotificationMessage;

/// Opaque handle of a delivered notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle(pub u64);

/// External notification capability
pub trait NotificationService: Send + Sync {
    fn deliver_now(&self, title: &str, body: &str) -> Result<NotificationHandle, String>;
    fn cancel(&self, handle: NotificationHandle);
}

#[derive(Debug, Default)]
struct HandleCounter(AtomicU64);

impl HandleCounter {
    fn next(&self) -> NotificationHandle {
        NotificationHandle(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier {
    counter: HandleCounter,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationService for LogNotifier {
    fn deliver_now(&self, title: &str, body: &str) -> Result<NotificationHandle, String> {
        let handle = self.counter.next();
        info!("Notification #{}: {} - {}", handle.0, title, body);
        Ok(handle)
    }

    fn cancel(&self, handle: NotificationHandle) {
        debug!("Notification #{} withdrawn", handle.0);
    }
}

/// Desktop notifications through `notify-send`
///
/// Server-side ids are captured with `--print-id` so a notification can be
/// closed again over D-Bus.
#[derive(Debug, Default)]
pub struct DesktopNotifier {
    counter: HandleCounter,
    server_ids: Arc<Mutex<HashMap<NotificationHandle, u32>>>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationService for DesktopNotifier {
    fn deliver_now(&self, title: &str, body: &str) -> Result<NotificationHandle, String> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| format!("No async runtime for notify-send: {}", e))?;

        let handle = self.counter.next();
        let server_ids = Arc::clone(&self.server_ids);
        let title = title.to_string();
        let body = body.to_string();

        runtime.spawn(async move {
            match send_desktop_notification(&title, &body).await {
                Ok(Some(id)) => {
                    if let Ok(mut ids) = server_ids.lock() {
                        ids.insert(handle, id);
                    }
                }
                Ok(None) => debug!("notify-send returned no notification id"),
                Err(e) => warn!("Desktop notification failed: {}", e),
            }
        });

        Ok(handle)
    }

    fn cancel(&self, handle: NotificationHandle) {
        let server_id = self
            .server_ids
            .lock()
            .ok()
            .and_then(|mut ids| ids.remove(&handle));

        let (Some(id), Ok(runtime)) = (server_id, tokio::runtime::Handle::try_current()) else {
            return;
        };

        runtime.spawn(async move {
            if let Err(e) = close_desktop_notification(id).await {
                warn!("Failed to close desktop notification {}: {}", id, e);
            }
        });
    }
}

/// Show a notification and return the id assigned by the notification server
pub async fn send_desktop_notification(title: &str, body: &str) -> Result<Option<u32>, String> {
    let output = Command::new("notify-send")
        .args(["--app-name=interval-timer", "--print-id", title, body])
        .output()
        .await
        .map_err(|e| format!("Failed to execute notify-send: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("notify-send failed: {}", stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().parse().ok())
}

/// Close a notification by its server id
pub async fn close_desktop_notification(id: u32) -> Result<(), String> {
    let id_arg = id.to_string();
    let output = Command::new("gdbus")
        .args([
            "call",
            "--session",
            "--dest",
            "org.freedesktop.Notifications",
            "--object-path",
            "/org/freedesktop/Notifications",
            "--method",
            "org.freedesktop.Notifications.CloseNotification",
            id_arg.as_str(),
        ])
        .output()
        .await
        .map_err(|e| format!("Failed to execute gdbus: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("gdbus CloseNotification failed: {}", stderr));
    }

    Ok(())
}

/// Check if notify-send is available on the system
pub async fn check_notify_send_available() -> Result<(), String> {
    Command::new("notify-send")
        .arg("--version")
        .output()
        .await
        .map_err(|_| {
            "notify-send is not available. Install libnotify or use --notifier log.".to_string()
        })?;

    info!("notify-send is available");
    Ok(())
}

/// Records everything it is asked to deliver; optionally refuses delivery.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    counter: HandleCounter,
    failing: bool,
    delivered: Mutex<Vec<NotificationMessage>>,
    cancelled: Mutex<Vec<NotificationHandle>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails, as when permission is revoked
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<NotificationMessage> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.delivered().into_iter().map(|m| m.title).collect()
    }

    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl NotificationService for RecordingNotifier {
    fn deliver_now(&self, title: &str, body: &str) -> Result<NotificationHandle, String> {
        if self.failing {
            return Err("notification permission revoked".to_string());
        }
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(NotificationMessage::new(title, body));
        }
        Ok(self.counter.next())
    }

    fn cancel(&self, handle: NotificationHandle) {
        if let Ok(mut cancelled) = self.cancelled.lock() {
            cancelled.push(handle);
        }
    }
}

/// Dispatches engine messages to a [`NotificationService`] and remembers
/// what is still on screen.
pub struct Notifier {
    service: Arc<dyn NotificationService>,
    outstanding: Vec<NotificationHandle>,
}

impl Notifier {
    pub fn new(service: Arc<dyn NotificationService>) -> Self {
        Self {
            service,
            outstanding: Vec::new(),
        }
    }

    /// Deliver exactly once. Failures are swallowed.
    pub fn deliver(&mut self, message: &NotificationMessage) -> Option<NotificationHandle> {
        match self.service.deliver_now(&message.title, &message.body) {
            Ok(handle) => {
                self.outstanding.push(handle);
                Some(handle)
            }
            Err(e) => {
                warn!("Notification '{}' not delivered: {}", message.title, e);
                None
            }
        }
    }

    /// Withdraw every notification delivered for the current session
    pub fn clear(&mut self) {
        for handle in self.outstanding.drain(..) {
            self.service.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_swallows_delivery_failures() {
        let mut notifier = Notifier::new(Arc::new(RecordingNotifier::failing()));
        assert!(notifier
            .deliver(&NotificationMessage::new("title", "body"))
            .is_none());
    }

    #[test]
    fn clear_cancels_outstanding_handles() {
        let service = Arc::new(RecordingNotifier::new());
        let mut notifier = Notifier::new(service.clone());

        let first = notifier.deliver(&NotificationMessage::new("a", "1"));
        let second = notifier.deliver(&NotificationMessage::new("b", "2"));
        notifier.clear();

        assert_eq!(service.titles(), vec!["a", "b"]);
        assert_eq!(
            service.cancelled(),
            vec![first.unwrap(), second.unwrap()]
        );

        notifier.clear();
        assert_eq!(service.cancelled().len(), 2);
    }

    #[test]
    fn log_notifier_hands_out_distinct_handles() {
        let notifier = LogNotifier::new();
        let a = notifier.deliver_now("a", "1").unwrap();
        let b = notifier.deliver_now("b", "2").unwrap();
        assert_ne!(a, b);
    }
}
