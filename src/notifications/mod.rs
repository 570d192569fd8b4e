//! Notifications: storage, publishing, mail senders and the delivery relay.
pub mod mail;
pub mod models;
pub mod publisher;
pub mod relay;
pub mod repo;

pub use self::mail::{BrevoMailSender, LogMailSender, MailMessage, MailSender};
pub use self::models::{DeliveryFlow, Message, Notification};
pub use self::publisher::NotificationPublisher;
pub use self::relay::{NotificationRelay, RelayConfig, RelayHandle, SweepReport};
pub use self::repo::NotificationRepository;
