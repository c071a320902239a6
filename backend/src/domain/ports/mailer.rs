//! Port abstraction for outbound notification delivery.
//!
//! Sends are fire-and-forget from the caller's perspective: failures are
//! logged by the spawning task, never surfaced to the original request,
//! and never retried beyond what the adapter itself does.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::account::Email;

/// Templated messages the system can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTemplate {
    /// Post-registration welcome, carrying the activation token.
    Welcome,
    /// Re-issued activation token.
    ActivationToken,
    /// Password-reset token.
    PasswordResetToken,
}

impl MailTemplate {
    /// Template identifier handed to the delivery collaborator.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Welcome => "account_welcome",
            Self::ActivationToken => "token_activation",
            Self::PasswordResetToken => "token_password_reset",
        }
    }
}

/// Delivery errors raised by mailer adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailerError {
    /// The message could not be handed to the delivery collaborator.
    #[error("mail delivery failed: {message}")]
    Delivery { message: String },
}

impl MailerError {
    /// Create a delivery error with the given message.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

/// Outbound notification delivery consumed by the account flows.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one templated message to `recipient`.
    async fn send(
        &self,
        recipient: &Email,
        template: MailTemplate,
        payload: Value,
    ) -> Result<(), MailerError>;
}
