//! Storage ports and row types for the indexer's durable state.
//!
//! Every port is a narrow async trait so the synchronizer and fan-out can
//! be exercised against in-memory implementations; the PostgreSQL
//! implementations live in [`postgres`].

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use attest_fetch::chain::log::DecodedEvent;

use crate::error::StoreError;

/// Durable per-source sync watermark.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Checkpoint {
    /// Source contract address the checkpoint belongs to.
    pub source_id: String,
    /// Last position fully processed for the source.
    pub last_processed_position: i64,
    /// When the position last advanced.
    pub last_processed_at: DateTime<Utc>,
    /// Number of failed sync cycles recorded for the source.
    pub error_count: i64,
    /// Message of the most recent failure, if any.
    pub last_error: Option<String>,
}

impl Checkpoint {
    /// Returns the default checkpoint used before a source's first
    /// successful batch, positioned so the next batch starts at
    /// `first_position`.
    pub fn starting_at(source_id: &str, first_position: u64) -> Self {
        Checkpoint {
            source_id: source_id.to_string(),
            last_processed_position: first_position as i64 - 1,
            last_processed_at: Utc::now(),
            error_count: 0,
            last_error: None,
        }
    }
}

/// A decoded event awaiting insertion into the event store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Fully qualified event name.
    pub event_name: String,
    /// Emitting contract address.
    pub source_address: String,
    /// Block position the event was emitted at.
    pub position: i64,
    /// Id of the emitting transaction.
    pub transaction_id: String,
    /// Index of the log within its transaction.
    pub sequence_in_transaction: i64,
    /// Decoded event arguments.
    pub payload: serde_json::Value,
}

impl From<DecodedEvent> for NewEvent {
    fn from(event: DecodedEvent) -> Self {
        NewEvent {
            event_name: event.name,
            source_address: event.source_address,
            position: event.position as i64,
            transaction_id: event.transaction_id,
            sequence_in_transaction: event.sequence_in_transaction as i64,
            payload: serde_json::Value::Object(event.args),
        }
    }
}

/// A persisted raw event row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredEvent {
    /// Internal row id.
    pub id: i64,
    /// Fully qualified event name.
    pub event_name: String,
    /// Emitting contract address.
    pub source_address: String,
    /// Block position the event was emitted at.
    pub position: i64,
    /// Id of the emitting transaction.
    pub transaction_id: String,
    /// Index of the log within its transaction.
    pub sequence_in_transaction: i64,
    /// Decoded event arguments.
    pub payload: serde_json::Value,
    /// Whether projection handlers have run for the event.
    pub applied: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// Projected profile row, keyed by wallet address.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Profile {
    /// Wallet address owning the profile.
    pub wallet_address: String,
    /// Display handle.
    pub handle: Option<String>,
    /// Off-chain profile metadata URI.
    pub metadata_uri: Option<String>,
    /// Contact email maintained by out-of-band profile settings.
    pub contact_email: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Projected skill row, keyed by the contract assigned skill id.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Skill {
    /// Skill id assigned by the emitting contract.
    pub skill_id: i64,
    /// Wallet address of the claiming profile.
    pub wallet_address: String,
    /// Claimed skill name.
    pub name: String,
    /// Evidence URI attached to the claim.
    pub evidence_uri: Option<String>,
    /// Whether a registered verifier has verified the claim.
    pub verified: bool,
}

/// Projected endorsement row, keyed by the contract assigned id.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Endorsement {
    /// Endorsement id assigned by the emitting contract.
    pub endorsement_id: i64,
    /// Skill the endorsement applies to.
    pub skill_id: i64,
    /// Endorsing wallet address.
    pub endorser: String,
    /// Endorsed wallet address.
    pub endorsee: String,
    /// Optional endorsement comment.
    pub comment: Option<String>,
}

/// Projected verifier row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Verifier {
    /// Wallet address of the verifier.
    pub wallet_address: String,
    /// Verifier display name.
    pub name: String,
    /// Whether the verifier is currently active.
    pub active: bool,
}

/// Projected bounty pool row, keyed by the contract assigned pool id.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BountyPool {
    /// Pool id assigned by the emitting contract.
    pub pool_id: i64,
    /// Skill name the pool rewards.
    pub skill_name: String,
    /// Funding wallet address.
    pub funder: String,
    /// Funded amount in base units.
    pub amount: i64,
    /// Whether the pool is open for claims.
    pub open: bool,
}

/// Projected bounty claim row, keyed by the contract assigned claim id.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BountyClaim {
    /// Claim id assigned by the emitting contract.
    pub claim_id: i64,
    /// Pool the claim is made against.
    pub pool_id: i64,
    /// Claiming wallet address.
    pub claimant: String,
    /// Skill backing the claim.
    pub skill_id: i64,
    /// Claim status.
    pub status: String,
}

/// A registered webhook consumer.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WebhookSubscription {
    /// Internal subscription id.
    pub id: i64,
    /// Endpoint the envelope is POSTed to.
    pub url: String,
    /// Event names the subscription is interested in.
    pub events: Vec<String>,
    /// Optional shared secret used to sign the envelope.
    pub secret: Option<String>,
    /// Whether the subscription currently receives deliveries.
    pub is_active: bool,
}

impl WebhookSubscription {
    /// Returns true if the subscription's filter set includes `event_name`.
    pub fn matches(&self, event_name: &str) -> bool {
        self.events.iter().any(|event| event == event_name)
    }
}

/// One webhook delivery attempt, appended to the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookDelivery {
    /// Subscription the delivery was attempted for.
    pub subscription_id: i64,
    /// Delivered event name.
    pub event_name: String,
    /// Snapshot of the delivered payload.
    pub payload: serde_json::Value,
    /// Whether the endpoint accepted the delivery.
    pub success: bool,
    /// HTTP status code returned by the endpoint, if it responded.
    pub status_code: Option<i32>,
    /// Transport or endpoint error message, if any.
    pub error_message: Option<String>,
}

/// An in-app notification awaiting insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// Recipient wallet address.
    pub recipient_id: String,
    /// Notification kind, mirrors the triggering event name.
    pub kind: String,
    /// Short title.
    pub title: String,
    /// Message body.
    pub message: String,
    /// Structured notification data.
    pub data: serde_json::Value,
}

/// Durable per-source watermark storage.
///
/// The checkpoint row is the sole mutable shared state of the indexer and
/// has a single writer: the sync worker owning the source.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the checkpoint for `source_id`, or `None` before the
    /// source's first recorded batch.
    async fn get(&self, source_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Advances the watermark to `position`.
    ///
    /// The stored position never decreases; an advance below the current
    /// watermark leaves the row unchanged.
    async fn advance(&self, source_id: &str, position: i64) -> Result<(), StoreError>;

    /// Records a failed cycle: increments `error_count` and sets
    /// `last_error` without touching the position. `position` seeds the
    /// row when the source has no checkpoint yet.
    async fn record_error(
        &self,
        source_id: &str,
        position: i64,
        error: &str,
    ) -> Result<(), StoreError>;
}

/// Append-only raw event storage with idempotent insertion.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts the event unless its `(transaction_id,
    /// sequence_in_transaction)` key already exists. Returns whether a row
    /// was inserted.
    async fn insert_if_absent(&self, event: &NewEvent) -> Result<bool, StoreError>;

    /// Returns the unapplied events of `source_address` within `[from,
    /// to]`, ordered by `(position, sequence_in_transaction)` ascending.
    async fn unapplied_in_range(
        &self,
        source_address: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// Marks an event as applied.
    async fn mark_applied(
        &self,
        transaction_id: &str,
        sequence_in_transaction: i64,
    ) -> Result<(), StoreError>;
}

/// Storage for the projected entities, written only by projection handlers.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Inserts or updates a profile row.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Updates a profile's handle and metadata URI. Returns whether a row
    /// matched.
    async fn update_profile_metadata(
        &self,
        wallet_address: &str,
        handle: Option<&str>,
        metadata_uri: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Returns the profile owned by `wallet_address`, if projected.
    async fn get_profile(&self, wallet_address: &str) -> Result<Option<Profile>, StoreError>;

    /// Inserts a skill row; a duplicate `skill_id` is a no-op.
    async fn insert_skill(&self, skill: &Skill) -> Result<(), StoreError>;

    /// Returns the skill with `skill_id`, if projected.
    async fn get_skill(&self, skill_id: i64) -> Result<Option<Skill>, StoreError>;

    /// Marks a skill as verified. Returns whether a row matched.
    async fn set_skill_verified(&self, skill_id: i64) -> Result<bool, StoreError>;

    /// Inserts an endorsement row; a duplicate `endorsement_id` is a no-op.
    async fn insert_endorsement(&self, endorsement: &Endorsement) -> Result<(), StoreError>;

    /// Inserts or updates a verifier row.
    async fn upsert_verifier(&self, verifier: &Verifier) -> Result<(), StoreError>;

    /// Inserts a bounty pool row; a duplicate `pool_id` is a no-op.
    async fn insert_bounty_pool(&self, pool: &BountyPool) -> Result<(), StoreError>;

    /// Returns the bounty pool with `pool_id`, if projected.
    async fn get_bounty_pool(&self, pool_id: i64) -> Result<Option<BountyPool>, StoreError>;

    /// Inserts a bounty claim row; a duplicate `claim_id` is a no-op.
    async fn insert_bounty_claim(&self, claim: &BountyClaim) -> Result<(), StoreError>;
}

/// Read access to webhook subscriptions and append access to the delivery
/// audit trail.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Returns the active subscriptions whose filter set includes
    /// `event_name`.
    async fn active_subscriptions_for(
        &self,
        event_name: &str,
    ) -> Result<Vec<WebhookSubscription>, StoreError>;

    /// Appends one delivery attempt to the audit trail.
    async fn append_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError>;
}

/// Insert access to the in-app notification feed.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Creates an in-app notification.
    async fn create(&self, notification: &NewNotification) -> Result<(), StoreError>;
}
