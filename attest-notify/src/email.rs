//! Email dispatch over SMTP.

use std::sync::Arc;

use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use attest_state::store::{ProjectionStore, StoredEvent};

use crate::{error::DeliveryError, inapp::notification_for};

/// Holds config data for the [`EmailNotifier`].
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP relay host; email dispatch is disabled when unset.
    pub smtp_host: Option<String>,
    /// SMTP relay port override.
    pub smtp_port: Option<u16>,
    /// SMTP username.
    pub smtp_username: Option<String>,
    /// SMTP password.
    pub smtp_password: Option<String>,
    /// Sender address.
    pub from_address: String,
}

impl EmailConfig {
    /// Returns a new instance of [`EmailConfig`].
    pub fn new(
        smtp_host: Option<String>,
        smtp_port: Option<u16>,
        smtp_username: Option<String>,
        smtp_password: Option<String>,
        from_address: Option<String>,
    ) -> Self {
        EmailConfig {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_address: from_address.unwrap_or_else(|| "Attest <attest@localhost>".to_string()),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self::new(None, None, None, None, None)
    }
}

/// Sends notification emails to recipients with a known contact address.
///
/// Cleanly disabled when no SMTP host is configured.
pub struct EmailNotifier {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    projections: Arc<dyn ProjectionStore>,
}

impl EmailNotifier {
    /// Creates a new EmailNotifier.
    pub fn new(
        config: EmailConfig,
        projections: Arc<dyn ProjectionStore>,
    ) -> Result<Self, DeliveryError> {
        let from: Mailbox = config.from_address.parse()?;
        let transport = match &config.smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?;
                if let Some(port) = config.smtp_port {
                    builder = builder.port(port);
                }
                if let (Some(username), Some(password)) =
                    (&config.smtp_username, &config.smtp_password)
                {
                    builder =
                        builder.credentials(Credentials::new(username.clone(), password.clone()));
                }
                Some(builder.build())
            }
            None => None,
        };
        Ok(EmailNotifier {
            transport,
            from,
            projections,
        })
    }

    /// Emails the recipient of `event`'s notification, when dispatch is
    /// enabled and the recipient's profile carries a contact address.
    /// Returns whether an email was sent.
    pub async fn notify(&self, event: &StoredEvent) -> Result<bool, DeliveryError> {
        let Some(transport) = &self.transport else {
            debug!("Email dispatch disabled, no SMTP host configured");
            return Ok(false);
        };
        let Some(notification) = notification_for(event, self.projections.as_ref()).await? else {
            return Ok(false);
        };
        let Some(profile) = self.projections.get_profile(&notification.recipient_id).await?
        else {
            return Ok(false);
        };
        let Some(contact_email) = profile.contact_email else {
            debug!(
                recipient = %notification.recipient_id,
                "Recipient has no contact email"
            );
            return Ok(false);
        };
        let message = Message::builder()
            .from(self.from.clone())
            .to(contact_email.parse()?)
            .subject(notification.title)
            .body(notification.message)?;
        transport.send(message).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_testutils::{stored_event, MemoryProjectionStore};
    use serde_json::json;

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let notifier = EmailNotifier::new(
            EmailConfig::default(),
            Arc::new(MemoryProjectionStore::new()),
        )
        .unwrap();
        let event = stored_event(
            "endorsement.created",
            json!({"endorsee": "0xaa", "endorser": "0xbb"}),
        );
        assert!(!notifier.notify(&event).await.unwrap());
    }

    #[test]
    fn invalid_from_address_is_an_error() {
        let result = EmailNotifier::new(
            EmailConfig::new(None, None, None, None, Some("not an address".to_string())),
            Arc::new(MemoryProjectionStore::new()),
        );
        assert!(matches!(result, Err(DeliveryError::EmailAddress(_))));
    }
}
