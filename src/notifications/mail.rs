//! Outbound mail senders used by the relay.
//!
//! `LogMailSender` only logs and is the default when no provider is configured.
//! `BrevoMailSender` posts to the Brevo transactional email API.
use crate::passport::APP_USER_AGENT;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, Instrument};
use url::Url;

pub const BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Mail delivery abstraction used by the relay.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a message, or return an error so it is retried on the next sweep.
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "mail send stub"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendEmailBody<'a> {
    sender: BrevoAddress<'a>,
    to: [BrevoAddress<'a>; 1],
    subject: &'a str,
    text_content: &'a str,
}

#[derive(Debug)]
pub struct BrevoMailSender {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
    sender_email: String,
}

impl BrevoMailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: SecretString, sender_email: String) -> Result<Self> {
        let endpoint = Url::parse(BREVO_API_URL).context("invalid Brevo endpoint")?;
        Self::with_endpoint(endpoint, api_key, sender_email)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoint(endpoint: Url, api_key: SecretString, sender_email: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build mail HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            sender_email,
        })
    }

    fn body<'a>(&'a self, message: &'a MailMessage) -> BrevoSendEmailBody<'a> {
        BrevoSendEmailBody {
            sender: BrevoAddress {
                email: &self.sender_email,
            },
            to: [BrevoAddress {
                email: &message.to_email,
            }],
            subject: &message.subject,
            text_content: &message.body,
        }
    }
}

#[async_trait]
impl MailSender for BrevoMailSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let span = tracing::info_span!("mail.send", mail.provider = "brevo");
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("api-key", self.api_key.expose_secret())
            .header("accept", "application/json")
            .json(&self.body(message))
            .send()
            .instrument(span)
            .await
            .context("failed to reach mail provider")?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("mail provider rejected message (status={status}): {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let message = MailMessage {
            to_email: "bob@example.com".to_string(),
            subject: "Hello".to_string(),
            body: "Body".to_string(),
        };
        assert!(LogMailSender.send(&message).await.is_ok());
    }

    #[test]
    fn brevo_payload_shape() -> Result<()> {
        let sender = BrevoMailSender::new(
            SecretString::from("key".to_string()),
            "noreply@passport.dev".to_string(),
        )?;
        let message = MailMessage {
            to_email: "bob@example.com".to_string(),
            subject: "Password Recovery".to_string(),
            body: "Your recovery code is: ABC234".to_string(),
        };
        assert_eq!(
            serde_json::to_value(sender.body(&message))?,
            json!({
                "sender": {"email": "noreply@passport.dev"},
                "to": [{"email": "bob@example.com"}],
                "subject": "Password Recovery",
                "textContent": "Your recovery code is: ABC234",
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn brevo_send_reports_transport_errors() -> Result<()> {
        // Nothing listens on port 9 locally.
        let sender = BrevoMailSender::with_endpoint(
            Url::parse("http://127.0.0.1:9/v3/smtp/email")?,
            SecretString::from("key".to_string()),
            "noreply@passport.dev".to_string(),
        )?;
        let message = MailMessage {
            to_email: "bob@example.com".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        assert!(sender.send(&message).await.is_err());
        Ok(())
    }
}
