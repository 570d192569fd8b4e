use super::models::{DeliveryFlow, Notification};
use crate::store::{DocumentStore, Filter, SharedStore, StoreResult};
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationRepository {
    store: SharedStore<Notification>,
}

impl NotificationRepository {
    #[must_use]
    pub fn new(store: SharedStore<Notification>) -> Self {
        Self { store }
    }

    pub async fn create(&self, notification: &Notification) -> StoreResult<()> {
        self.store.create(notification).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        self.store.get_by_id(id).await
    }

    /// Persist the delivery flags set by [`Notification::mark_sent`].
    pub async fn save_delivery(&self, notification: &Notification) -> StoreResult<bool> {
        self.store
            .save_fields(notification, &["isSent", "sentOn"])
            .await
    }

    /// Persist the read flags set by [`Notification::mark_read`].
    pub async fn save_read(&self, notification: &Notification) -> StoreResult<bool> {
        self.store
            .save_fields(notification, &["isRead", "readOn"])
            .await
    }

    /// Email notifications still waiting for delivery, oldest first.
    pub async fn pending_email(&self) -> StoreResult<Vec<Notification>> {
        self.store
            .find(&Filter::And(vec![
                Filter::eq("isSent", false),
                Filter::eq("flow", json!(DeliveryFlow::Email)),
            ]))
            .await
    }

    pub async fn unread_for(&self, identity_id: Uuid) -> StoreResult<Vec<Notification>> {
        self.store
            .find(&Filter::And(vec![
                Filter::eq("identityId", identity_id.to_string()),
                Filter::eq("isRead", false),
            ]))
            .await
    }
}
