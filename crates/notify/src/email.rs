//! SMTP email notifier via `lettre` with TLS support.
//!
//! Delivers notifications as emails through an SMTP server.
//! Supports STARTTLS and implicit TLS connections.

use crate::channel::ChannelSpec;
use crate::traits::{Notification, Notifier, NotifyError};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

/// Sends notifications as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("{addr}: {e}")))
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from channel config.
    ///
    /// Config keys:
    /// - `smtp_host` (required), `smtp_port` (default 587; 465 uses implicit TLS)
    /// - `tls` (default `true`; `false` sends in plain text)
    /// - `from`, `to` (a single address or a list)
    /// - `username` / `password`; when absent, `SMTP_USERNAME` / `SMTP_PASSWORD`
    ///   from the environment are used if both are set.
    pub fn from_channel(spec: &ChannelSpec) -> Result<Self, NotifyError> {
        let smtp_host = spec.required("smtp_host")?;
        let port = match spec.optional("smtp_port")? {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| NotifyError::Config(format!("invalid smtp_port: {p}")))?,
            None => 587,
        };
        let use_tls = match spec.optional("tls")? {
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| NotifyError::Config(format!("invalid tls flag: {v}")))?,
            None => true,
        };

        let from = parse_mailbox(&spec.required("from")?)?;
        let to = spec
            .string_list("to")?
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;

        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host).port(port)
        };

        let credentials = match (spec.optional("username")?, spec.optional("password")?) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => match (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD")) {
                (Ok(username), Ok(password)) => Some((username, password)),
                _ => None,
            },
        };
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let mut message_builder = Message::builder().from(self.from.clone());

        for recipient in &self.to {
            message_builder = message_builder.to(recipient.clone());
        }

        message_builder
            .subject(&notification.title)
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let email = self.message(notification)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::debug!(
            channel = "email",
            subject = %notification.title,
            recipients = self.to.len(),
            "notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
