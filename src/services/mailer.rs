// services/mailer.rs - Outbound email collaborator
// Delivery itself happens elsewhere; provisioning only hands messages off

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Logs messages instead of sending them. Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        info!("Mail to {} from {}: {}", message.to, message.from, message.subject);
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let response = self.client.post(&self.relay_url).json(&message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }
        info!("Relayed mail to {}: {}", message.to, message.subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        let message = EmailMessage {
            to: "admin@acme.test".into(),
            from: "noreply@example.com".into(),
            subject: "Welcome".into(),
            text: "Hello".into(),
        };
        assert!(LogMailer.send(message).await.is_ok());
    }

    #[tokio::test]
    async fn http_mailer_reports_unreachable_relay() {
        let port = portpicker::pick_unused_port().expect("no free port");
        let mailer = HttpMailer::new(format!("http://127.0.0.1:{}/send", port), Duration::from_millis(500)).unwrap();
        let message = EmailMessage {
            to: "admin@acme.test".into(),
            from: "noreply@example.com".into(),
            subject: "Welcome".into(),
            text: "Hello".into(),
        };
        assert!(matches!(mailer.send(message).await, Err(MailError::Http(_))));
    }
}
