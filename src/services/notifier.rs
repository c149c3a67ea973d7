// src/services/notifier.rs

use crate::config::SmtpConfig;
use crate::models::ServiceError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};
use std::time::Duration;

/// Outbound notifications (invitations, review reminders).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), ServiceError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, from: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let from: Mailbox = from.parse().map_err(|e| {
            error!("❌ Invalid sender address {}: {:?}", from, e);
            ServiceError::InternalServerError
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                error!("❌ Failed to configure SMTP relay {}: {:?}", config.host, e);
                ServiceError::InternalServerError
            })?
            .port(config.port)
            .timeout(Some(timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(SmtpNotifier {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    // One message per recipient so addresses are never disclosed to each other
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), ServiceError> {
        for recipient in recipients {
            let to: Mailbox = recipient.parse().map_err(|e| {
                error!("❌ Invalid recipient address {}: {:?}", recipient, e);
                ServiceError::InternalServerError
            })?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())
                .map_err(|e| {
                    error!("❌ Failed to build email: {:?}", e);
                    ServiceError::InternalServerError
                })?;

            self.transport.send(message).await.map_err(|e| {
                error!("❌ Failed to send email to {}: {:?}", recipient, e);
                ServiceError::InternalServerError
            })?;
        }

        info!("📧 Sent '{}' to {} recipient(s)", subject, recipients.len());
        Ok(())
    }
}

// Development notifier: writes each message to the log instead of sending it
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), ServiceError> {
        info!("📧 [{}] to {}: {}", subject, recipients.join(", "), body);
        Ok(())
    }
}
