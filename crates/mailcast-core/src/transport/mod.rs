//! SMTP transport adapter
//!
//! Every call opens its own connection; there is no pooling and no retry.

mod smtp;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use smtp::SmtpTransport;

use async_trait::async_trait;
use mailcast_storage::models::{EmailContact, SmtpSettings};
use thiserror::Error;

/// Failure reported by a transport call
///
/// The display text is what ends up in a campaign's error list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid from address: {0}")]
    InvalidSender(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Server {0} rejected the connection")]
    Rejected(String),

    #[error("{0}")]
    Delivery(String),
}

/// Outbound mail transport
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Check that the relay accepts a connection (and login, if configured)
    async fn verify(&self, settings: &SmtpSettings) -> Result<(), TransportError>;

    /// Deliver one HTML message to one recipient
    async fn send(
        &self,
        recipient: &EmailContact,
        subject: &str,
        html: &str,
        settings: &SmtpSettings,
    ) -> Result<(), TransportError>;
}
