//! Holds error types for the notification fan-out.

use attest_state::error::StoreError;

/// Errors raised while delivering a notification to a downstream consumer.
///
/// Deliveries are retried up to a fixed bound, then logged as permanent
/// failures; they never affect indexing correctness.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// HTTP transport error while delivering a webhook.
    #[error("Webhook transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook endpoint rejected the delivery.
    #[error("Webhook endpoint returned status {0}")]
    Endpoint(u16),

    /// SMTP transport error while sending an email.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Invalid email address.
    #[error("Email address error: {0}")]
    EmailAddress(#[from] lettre::address::AddressError),

    /// Email message could not be built.
    #[error("Email build error: {0}")]
    EmailBuild(#[from] lettre::error::Error),

    /// Serialization error while building an envelope.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from the storage ports.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
