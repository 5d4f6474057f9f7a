//! Mail delivery seam shared by the dispatcher and the transport implementations.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// A fully rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Language tag of the recipient (e.g., "en")
    pub language: String,
    pub from: String,
}

/// Acknowledgement returned by the transport for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider-side message id, when the transport reports one
    pub message_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail rejected by provider ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Something that can deliver an [`OutgoingMail`].
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<SendReceipt, MailError>;
}
