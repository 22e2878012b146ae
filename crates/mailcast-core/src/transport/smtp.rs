//! lettre-backed SMTP transport

use super::{MailTransport, TransportError};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailcast_storage::models::{EmailContact, SmtpSettings};
use tracing::debug;

/// SMTP transport using the relay settings passed to each call
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    pub fn new() -> Self {
        Self
    }

    /// Build a one-shot mailer for the given settings.
    ///
    /// `use_ssl` selects implicit TLS; otherwise STARTTLS is used when the
    /// server offers it.
    fn mailer(
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let builder = if settings.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| TransportError::Connect(e.to_string()))?
        } else {
            let tls = TlsParameters::new(settings.host.clone())
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .tls(Tls::Opportunistic(tls))
        };

        let mut builder = builder.port(settings.port);
        if settings.use_auth {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    /// Build the message: `"fromName" <fromEmail>` to `"name" <email>`, HTML body
    pub fn build_message(
        recipient: &EmailContact,
        subject: &str,
        html: &str,
        settings: &SmtpSettings,
    ) -> Result<Message, TransportError> {
        let from_address: Address = settings
            .from_email
            .parse()
            .map_err(|e| TransportError::InvalidSender(format!("{}: {}", settings.from_email, e)))?;
        let to_address: Address = recipient
            .email
            .trim()
            .parse()
            .map_err(|e| TransportError::InvalidRecipient(format!("{}: {}", recipient.email, e)))?;

        let from = Mailbox::new(display_name(&settings.from_name), from_address);
        let to = Mailbox::new(display_name(&recipient.name), to_address);

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| TransportError::Build(e.to_string()))
    }
}

fn display_name(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn verify(&self, settings: &SmtpSettings) -> Result<(), TransportError> {
        let mailer = Self::mailer(settings)?;

        debug!(host = %settings.host, port = settings.port, "Verifying SMTP connection");

        match mailer.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransportError::Rejected(settings.host.clone())),
            Err(e) => Err(TransportError::Connect(e.to_string())),
        }
    }

    async fn send(
        &self,
        recipient: &EmailContact,
        subject: &str,
        html: &str,
        settings: &SmtpSettings,
    ) -> Result<(), TransportError> {
        let message = Self::build_message(recipient, subject, html, settings)?;
        let mailer = Self::mailer(settings)?;

        let response = mailer
            .send(message)
            .await
            .map_err(|e| TransportError::Delivery(e.to_string()))?;

        debug!(
            to = %recipient.email,
            code = %response.code(),
            "Message accepted by relay"
        );
        Ok(())
    }
}
