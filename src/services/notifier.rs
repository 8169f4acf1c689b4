//! Delivery of account-holder notifications.
//!
//! Notifications are sent after commit and are fire-and-forget: a failed
//! delivery is logged and never affects the money movement behind it.

use crate::models::Notification;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Fan-out to in-process subscribers over a broadcast channel
pub struct NotificationHub {
    tx: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(1000) // Buffer up to 1000 messages
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, notification: &Notification) {
        if let Err(e) = self.tx.send(notification.clone()) {
            warn!(account = %notification.account, "no notification subscribers: {}", e);
        }
    }
}

/// Writes notifications to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!(account = %notification.account, message = %notification.message, "notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountRef;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_hub_delivers_to_subscribers() {
        let hub = NotificationHub::default();
        let mut rx = hub.subscribe();
        let notification = Notification::new(AccountRef::User(Uuid::new_v4()), "Your deposit was accepted");

        hub.notify(&notification);

        let received = rx.recv().await.expect("Failed to receive notification");
        assert_eq!(received, notification);
    }

    #[test]
    fn test_hub_without_subscribers_does_not_fail() {
        let hub = NotificationHub::new(4);
        hub.notify(&Notification::new(AccountRef::Club(Uuid::new_v4()), "hello"));
    }
}
