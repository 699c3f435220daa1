use crate::models::Notification;
use crate::storage::{Notifier, StorageError};
use crate::types::UserId;
use dashmap::DashMap;

/// In-memory `Notifier` that keeps every notification per user.
pub struct NotificationOutbox {
    notifications: DashMap<UserId, Vec<Notification>>
}

impl NotificationOutbox {
    pub fn new() -> Self {
        Self { notifications: DashMap::new() }
    }

    pub fn for_user(&self, user_id: &str) -> Vec<Notification> {
        self.notifications.get(user_id)
            .map(|notifications| notifications.clone())
            .unwrap_or_default()
    }
}

impl Default for NotificationOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotificationOutbox {
    async fn notify(&self, notification: Notification) -> Result<(), StorageError> {
        self.notifications.entry(notification.user_id.clone())
            .or_default()
            .push(notification);

        Ok(())
    }
}
