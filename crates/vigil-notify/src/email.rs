//! Email delivery.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::BoxFuture;
use crate::error::{NotifyError, NotifyResult};

/// A fully addressed plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Sends email. A message with an empty `to` list is a no-op.
pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, NotifyResult<()>>;
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Sender address, e.g. `vigil <alerts@example.com>`.
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Mailer backed by an SMTP relay with STARTTLS.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let from = parse_mailbox(&config.from)?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    async fn deliver(&self, email: &OutboundEmail) -> NotifyResult<()> {
        if email.to.is_empty() {
            debug!(subject = %email.subject, "no primary recipients, email not sent");
            return Ok(());
        }

        let message = build_message(self.from.clone(), email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        info!(
            to = email.to.len(),
            cc = email.cc.len(),
            subject = %email.subject,
            "email sent"
        );
        Ok(())
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, NotifyResult<()>> {
        Box::pin(self.deliver(email))
    }
}

/// Mailer that only logs, used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, NotifyResult<()>> {
        Box::pin(async move {
            if !email.to.is_empty() {
                info!(
                    to = ?email.to,
                    cc = ?email.cc,
                    subject = %email.subject,
                    "smtp not configured, email logged only"
                );
            }
            Ok(())
        })
    }
}

fn parse_mailbox(address: &str) -> NotifyResult<Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Build the lettre message for an outbound email.
pub fn build_message(from: Mailbox, email: &OutboundEmail) -> NotifyResult<Message> {
    let mut builder = Message::builder().from(from).subject(email.subject.as_str());
    for addr in &email.to {
        builder = builder.to(parse_mailbox(addr)?);
    }
    for addr in &email.cc {
        builder = builder.cc(parse_mailbox(addr)?);
    }
    builder
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| NotifyError::Smtp(e.to_string()))
}
