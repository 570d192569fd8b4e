use super::models::{DeliveryFlow, Message, Notification};
use super::repo::NotificationRepository;
use crate::error::Result;
use tracing::debug;
use uuid::Uuid;

/// Entry point for anything that wants to tell an identity something.
///
/// Publishing only persists the notification; email delivery happens later in the
/// relay, so a slow mail provider never holds up the request that triggered it.
#[derive(Clone)]
pub struct NotificationPublisher {
    notifications: NotificationRepository,
}

impl NotificationPublisher {
    #[must_use]
    pub fn new(notifications: NotificationRepository) -> Self {
        Self { notifications }
    }

    /// # Errors
    /// Returns an error if the notification cannot be stored.
    pub async fn publish(
        &self,
        flow: DeliveryFlow,
        identity_id: Uuid,
        message: Message,
    ) -> Result<Notification> {
        let notification = Notification::new(flow, identity_id, message);
        self.notifications.create(&notification).await?;
        debug!(
            notification_id = %notification.id,
            identity_id = %identity_id,
            topic = %notification.topic,
            "notification queued"
        );
        Ok(notification)
    }
}
