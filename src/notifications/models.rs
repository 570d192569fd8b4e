use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// How a notification reaches its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFlow {
    /// Delivered by the relay through the mail sender.
    Email,
    /// Shown through the reader surface only.
    InApp,
}

/// Content handed to a publisher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub header: String,
    pub body: String,
    pub params: BTreeMap<String, String>,
}

impl Message {
    pub fn new(
        topic: impl Into<String>,
        header: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            header: header.into(),
            body: body.into(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub flow: DeliveryFlow,
    pub identity_id: Uuid,
    pub topic: String,
    pub header: String,
    pub body: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub is_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<DateTime<Utc>>,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Notification {
    /// Every notification starts unread. Email ones also start unsent and wait for the
    /// relay; in-app ones count as delivered on creation.
    #[must_use]
    pub fn new(flow: DeliveryFlow, identity_id: Uuid, message: Message) -> Self {
        let now = Utc::now();
        let is_email = flow == DeliveryFlow::Email;
        Self {
            id: Uuid::now_v7(),
            flow,
            identity_id,
            topic: message.topic,
            header: message.header,
            body: message.body,
            params: message.params,
            is_sent: !is_email,
            sent_on: (!is_email).then_some(now),
            is_read: false,
            read_on: None,
            created_on: now,
        }
    }

    pub fn mark_sent(&mut self) {
        self.is_sent = true;
        self.sent_on = Some(Utc::now());
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
        self.read_on = Some(Utc::now());
    }

    /// Address the relay delivers to.
    #[must_use]
    pub fn recipient(&self) -> Option<&str> {
        self.params
            .get("email")
            .map(String::as_str)
            .filter(|email| !email.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_notifications_start_unsent() {
        let message = Message::new("identity", "Password Recovery", "code")
            .with_param("email", "bob@example.com");
        let notification = Notification::new(DeliveryFlow::Email, Uuid::nil(), message);
        assert!(!notification.is_sent);
        assert!(notification.sent_on.is_none());
        assert!(!notification.is_read);
        assert_eq!(notification.recipient(), Some("bob@example.com"));
    }

    #[test]
    fn in_app_notifications_start_unread() {
        let notification =
            Notification::new(DeliveryFlow::InApp, Uuid::nil(), Message::new("t", "h", "b"));
        assert!(notification.is_sent);
        assert!(notification.sent_on.is_some());
        assert!(!notification.is_read);
        assert_eq!(notification.recipient(), None);
    }

    #[test]
    fn flow_serializes_snake_case() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_value(DeliveryFlow::InApp)?, "in_app");
        assert_eq!(serde_json::to_value(DeliveryFlow::Email)?, "email");
        Ok(())
    }
}
