//! PostgreSQL implementations of the storage ports.
//!
//! Each store is a newtype wrapping a shared `PgPool`. All SQL is
//! runtime-checked (`sqlx::query`, not the compile-time macros) so builds
//! do not require a live database.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{
    error::StoreError,
    store::{
        BountyClaim, BountyPool, Checkpoint, CheckpointStore, Endorsement, EventStore,
        NewEvent, NewNotification, NotificationStore, Profile, ProjectionStore, Skill,
        StoredEvent, SubscriptionStore, Verifier, WebhookDelivery, WebhookSubscription,
    },
};

/// Embedded schema applied at startup.
const SCHEMA: &str = include_str!("schema.sql");

/// Connects to PostgreSQL and applies the schema.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    Ok(pool)
}

/// PostgreSQL-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    /// Creates a new PgCheckpointStore over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn get(&self, source_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query_as::<_, Checkpoint>(
            "SELECT source_id, last_processed_position, last_processed_at, error_count, last_error
             FROM checkpoints WHERE source_id = $1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn advance(&self, source_id: &str, position: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO checkpoints (source_id, last_processed_position, last_processed_at)
             VALUES ($1, $2, now())
             ON CONFLICT (source_id) DO UPDATE
             SET last_processed_position =
                     GREATEST(checkpoints.last_processed_position, EXCLUDED.last_processed_position),
                 last_processed_at = now()",
        )
        .bind(source_id)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_error(
        &self,
        source_id: &str,
        position: i64,
        error: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO checkpoints (source_id, last_processed_position, error_count, last_error)
             VALUES ($1, $2, 1, $3)
             ON CONFLICT (source_id) DO UPDATE
             SET error_count = checkpoints.error_count + 1,
                 last_error = EXCLUDED.last_error",
        )
        .bind(source_id)
        .bind(position)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// PostgreSQL-backed raw event store.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new PgEventStore over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_if_absent(&self, event: &NewEvent) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO chain_events
                 (event_name, source_address, position, transaction_id,
                  sequence_in_transaction, payload)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (transaction_id, sequence_in_transaction) DO NOTHING",
        )
        .bind(&event.event_name)
        .bind(&event.source_address)
        .bind(event.position)
        .bind(&event.transaction_id)
        .bind(event.sequence_in_transaction)
        .bind(&event.payload)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn unapplied_in_range(
        &self,
        source_address: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            "SELECT id, event_name, source_address, position, transaction_id,
                    sequence_in_transaction, payload, applied, created_at
             FROM chain_events
             WHERE source_address = $1 AND position BETWEEN $2 AND $3 AND applied = FALSE
             ORDER BY position ASC, sequence_in_transaction ASC",
        )
        .bind(source_address)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_applied(
        &self,
        transaction_id: &str,
        sequence_in_transaction: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE chain_events SET applied = TRUE
             WHERE transaction_id = $1 AND sequence_in_transaction = $2",
        )
        .bind(transaction_id)
        .bind(sequence_in_transaction)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// PostgreSQL-backed projection store.
#[derive(Debug, Clone)]
pub struct PgProjectionStore {
    pool: PgPool,
}

impl PgProjectionStore {
    /// Creates a new PgProjectionStore over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectionStore for PgProjectionStore {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profiles (wallet_address, handle, metadata_uri, contact_email)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (wallet_address) DO UPDATE
             SET handle = EXCLUDED.handle,
                 metadata_uri = EXCLUDED.metadata_uri,
                 updated_at = now()",
        )
        .bind(&profile.wallet_address)
        .bind(&profile.handle)
        .bind(&profile.metadata_uri)
        .bind(&profile.contact_email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_profile_metadata(
        &self,
        wallet_address: &str,
        handle: Option<&str>,
        metadata_uri: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE profiles
             SET handle = COALESCE($2, handle),
                 metadata_uri = COALESCE($3, metadata_uri),
                 updated_at = now()
             WHERE wallet_address = $1",
        )
        .bind(wallet_address)
        .bind(handle)
        .bind(metadata_uri)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_profile(&self, wallet_address: &str) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, Profile>(
            "SELECT wallet_address, handle, metadata_uri, contact_email, created_at, updated_at
             FROM profiles WHERE wallet_address = $1",
        )
        .bind(wallet_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_skill(&self, skill: &Skill) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO skills (skill_id, wallet_address, name, evidence_uri, verified)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (skill_id) DO NOTHING",
        )
        .bind(skill.skill_id)
        .bind(&skill.wallet_address)
        .bind(&skill.name)
        .bind(&skill.evidence_uri)
        .bind(skill.verified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_skill(&self, skill_id: i64) -> Result<Option<Skill>, StoreError> {
        let row = sqlx::query_as::<_, Skill>(
            "SELECT skill_id, wallet_address, name, evidence_uri, verified
             FROM skills WHERE skill_id = $1",
        )
        .bind(skill_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_skill_verified(&self, skill_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE skills SET verified = TRUE WHERE skill_id = $1")
            .bind(skill_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_endorsement(&self, endorsement: &Endorsement) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO endorsements (endorsement_id, skill_id, endorser, endorsee, comment)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (endorsement_id) DO NOTHING",
        )
        .bind(endorsement.endorsement_id)
        .bind(endorsement.skill_id)
        .bind(&endorsement.endorser)
        .bind(&endorsement.endorsee)
        .bind(&endorsement.comment)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_verifier(&self, verifier: &Verifier) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO verifiers (wallet_address, name, active)
             VALUES ($1, $2, $3)
             ON CONFLICT (wallet_address) DO UPDATE
             SET name = EXCLUDED.name, active = EXCLUDED.active",
        )
        .bind(&verifier.wallet_address)
        .bind(&verifier.name)
        .bind(verifier.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_bounty_pool(&self, pool: &BountyPool) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bounty_pools (pool_id, skill_name, funder, amount, open)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (pool_id) DO NOTHING",
        )
        .bind(pool.pool_id)
        .bind(&pool.skill_name)
        .bind(&pool.funder)
        .bind(pool.amount)
        .bind(pool.open)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bounty_pool(&self, pool_id: i64) -> Result<Option<BountyPool>, StoreError> {
        let row = sqlx::query_as::<_, BountyPool>(
            "SELECT pool_id, skill_name, funder, amount, open
             FROM bounty_pools WHERE pool_id = $1",
        )
        .bind(pool_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_bounty_claim(&self, claim: &BountyClaim) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bounty_claims (claim_id, pool_id, claimant, skill_id, status)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (claim_id) DO NOTHING",
        )
        .bind(claim.claim_id)
        .bind(claim.pool_id)
        .bind(&claim.claimant)
        .bind(claim.skill_id)
        .bind(&claim.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// PostgreSQL-backed webhook subscription store and delivery audit trail.
#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    /// Creates a new PgSubscriptionStore over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn active_subscriptions_for(
        &self,
        event_name: &str,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        let rows = sqlx::query_as::<_, WebhookSubscription>(
            "SELECT id, url, events, secret, is_active
             FROM webhook_subscriptions
             WHERE is_active = TRUE AND $1 = ANY(events)",
        )
        .bind(event_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn append_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO webhook_deliveries
                 (subscription_id, event_name, payload, success, status_code, error_message)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(delivery.subscription_id)
        .bind(&delivery.event_name)
        .bind(&delivery.payload)
        .bind(delivery.success)
        .bind(delivery.status_code)
        .bind(&delivery.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// PostgreSQL-backed in-app notification store.
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Creates a new PgNotificationStore over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, notification: &NewNotification) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notifications (recipient_id, kind, title, message, data)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&notification.recipient_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
