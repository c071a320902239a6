//! Notification adapter.
//!
//! Message delivery is an external collaborator; this adapter records the
//! handoff through structured logging so deployments without a delivery
//! backend still trace every send. A transport-backed implementation
//! plugs in behind the same [`Mailer`] port.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::domain::account::Email;
use crate::domain::ports::{MailTemplate, Mailer, MailerError};

/// Mailer that logs each send instead of delivering it.
#[derive(Clone, Default)]
pub struct TracingMailer;

impl TracingMailer {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(
        &self,
        recipient: &Email,
        template: MailTemplate,
        _payload: Value,
    ) -> Result<(), MailerError> {
        // The payload carries token plaintext; log the envelope only.
        info!(
            recipient = %recipient,
            template = template.name(),
            "notification dispatched"
        );
        Ok(())
    }
}
