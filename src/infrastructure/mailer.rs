use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::domain::errors::DomainError;
use crate::domain::ports::{EmailMessage, Mailer};

/// SMTP relay mailer. Port 465 uses implicit TLS, every other port STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, DomainError> {
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| DomainError::Internal(format!("invalid SMTP relay '{}': {e}", config.host)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();
        let from = parse_mailbox(&config.from)?;

        Ok(Self { transport, from })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DomainError> {
    address
        .parse()
        .map_err(|e| DomainError::InvalidInput(format!("invalid email address '{address}': {e}")))
}

fn build_message(from: Mailbox, message: EmailMessage) -> Result<Message, DomainError> {
    Message::builder()
        .from(from)
        .to(parse_mailbox(&message.to)?)
        .subject(message.subject)
        .multipart(MultiPart::alternative_plain_html(message.text, message.html))
        .map_err(|e| DomainError::Internal(format!("failed to build email: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError> {
        let email = build_message(self.from.clone(), message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| DomainError::Internal(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

/// Stand-in used when no SMTP relay is configured: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError> {
        log::info!(
            "SMTP not configured; would send '{}' to {}",
            message.subject,
            message.to
        );
        Ok(())
    }
}
