//! Domain projection handlers, one per event type.

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::{
    error::ProjectionError,
    metrics,
    projection::ProjectionHandler,
    store::{
        BountyClaim, BountyPool, Endorsement, Profile, ProjectionStore, Skill, StoredEvent,
        Verifier,
    },
};

/// Returns a required string argument from the event payload.
fn arg_str<'a>(event: &'a StoredEvent, key: &str) -> Result<&'a str, ProjectionError> {
    event
        .payload
        .get(key)
        .and_then(|value| value.as_str())
        .ok_or_else(|| {
            ProjectionError::Malformed(format!(
                "{} event missing string argument: {}",
                event.event_name, key
            ))
        })
}

/// Returns an optional string argument from the event payload.
fn arg_opt_str<'a>(event: &'a StoredEvent, key: &str) -> Option<&'a str> {
    event.payload.get(key).and_then(|value| value.as_str())
}

/// Returns a required integer argument from the event payload.
fn arg_i64(event: &StoredEvent, key: &str) -> Result<i64, ProjectionError> {
    event
        .payload
        .get(key)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| {
            ProjectionError::Malformed(format!(
                "{} event missing integer argument: {}",
                event.event_name, key
            ))
        })
}

/// Logs and counts a mutation skipped because its parent entity is absent.
fn skip_missing_parent(event: &StoredEvent, entity: &str, key: &str) {
    warn!(
        event = %event.event_name,
        transaction_id = %event.transaction_id,
        "Skipping projection: {} {} not yet projected",
        entity,
        key
    );
    metrics::record_projection_skip(&event.event_name);
}

/// Upserts a profile row for `profile.created`.
pub struct ProfileCreated;

#[async_trait]
impl ProjectionHandler for ProfileCreated {
    fn event_name(&self) -> &'static str {
        "profile.created"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        let now = Utc::now();
        store
            .upsert_profile(&Profile {
                wallet_address: arg_str(event, "wallet")?.to_string(),
                handle: arg_opt_str(event, "handle").map(str::to_string),
                metadata_uri: arg_opt_str(event, "metadata_uri").map(str::to_string),
                contact_email: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(())
    }
}

/// Updates profile metadata for `profile.updated`.
pub struct ProfileUpdated;

#[async_trait]
impl ProjectionHandler for ProfileUpdated {
    fn event_name(&self) -> &'static str {
        "profile.updated"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        let wallet = arg_str(event, "wallet")?;
        let updated = store
            .update_profile_metadata(
                wallet,
                arg_opt_str(event, "handle"),
                arg_opt_str(event, "metadata_uri"),
            )
            .await?;
        if !updated {
            skip_missing_parent(event, "profile", wallet);
        }
        Ok(())
    }
}

/// Inserts a skill row for `skill.claimed`.
pub struct SkillClaimed;

#[async_trait]
impl ProjectionHandler for SkillClaimed {
    fn event_name(&self) -> &'static str {
        "skill.claimed"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        let wallet = arg_str(event, "wallet")?;
        if store.get_profile(wallet).await?.is_none() {
            skip_missing_parent(event, "profile", wallet);
            return Ok(());
        }
        store
            .insert_skill(&Skill {
                skill_id: arg_i64(event, "skill_id")?,
                wallet_address: wallet.to_string(),
                name: arg_str(event, "name")?.to_string(),
                evidence_uri: arg_opt_str(event, "evidence_uri").map(str::to_string),
                verified: false,
            })
            .await?;
        Ok(())
    }
}

/// Marks a skill verified for `skill.verified`.
pub struct SkillVerified;

#[async_trait]
impl ProjectionHandler for SkillVerified {
    fn event_name(&self) -> &'static str {
        "skill.verified"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        let skill_id = arg_i64(event, "skill_id")?;
        if !store.set_skill_verified(skill_id).await? {
            skip_missing_parent(event, "skill", &skill_id.to_string());
        }
        Ok(())
    }
}

/// Inserts an endorsement row for `endorsement.created`.
pub struct EndorsementCreated;

#[async_trait]
impl ProjectionHandler for EndorsementCreated {
    fn event_name(&self) -> &'static str {
        "endorsement.created"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        let endorsee = arg_str(event, "endorsee")?;
        if store.get_profile(endorsee).await?.is_none() {
            skip_missing_parent(event, "profile", endorsee);
            return Ok(());
        }
        store
            .insert_endorsement(&Endorsement {
                endorsement_id: arg_i64(event, "endorsement_id")?,
                skill_id: arg_i64(event, "skill_id")?,
                endorser: arg_str(event, "endorser")?.to_string(),
                endorsee: endorsee.to_string(),
                comment: arg_opt_str(event, "comment").map(str::to_string),
            })
            .await?;
        Ok(())
    }
}

/// Upserts a verifier row for `verifier.registered`.
pub struct VerifierRegistered;

#[async_trait]
impl ProjectionHandler for VerifierRegistered {
    fn event_name(&self) -> &'static str {
        "verifier.registered"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        store
            .upsert_verifier(&Verifier {
                wallet_address: arg_str(event, "wallet")?.to_string(),
                name: arg_str(event, "name")?.to_string(),
                active: true,
            })
            .await?;
        Ok(())
    }
}

/// Inserts a bounty pool row for `bounty_pool.created`.
pub struct BountyPoolCreated;

#[async_trait]
impl ProjectionHandler for BountyPoolCreated {
    fn event_name(&self) -> &'static str {
        "bounty_pool.created"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        store
            .insert_bounty_pool(&BountyPool {
                pool_id: arg_i64(event, "pool_id")?,
                skill_name: arg_str(event, "skill_name")?.to_string(),
                funder: arg_str(event, "funder")?.to_string(),
                amount: arg_i64(event, "amount")?,
                open: true,
            })
            .await?;
        Ok(())
    }
}

/// Inserts a bounty claim row for `bounty.claimed`.
pub struct BountyClaimed;

#[async_trait]
impl ProjectionHandler for BountyClaimed {
    fn event_name(&self) -> &'static str {
        "bounty.claimed"
    }

    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError> {
        let pool_id = arg_i64(event, "pool_id")?;
        if store.get_bounty_pool(pool_id).await?.is_none() {
            skip_missing_parent(event, "bounty pool", &pool_id.to_string());
            return Ok(());
        }
        store
            .insert_bounty_claim(&BountyClaim {
                claim_id: arg_i64(event, "claim_id")?,
                pool_id,
                claimant: arg_str(event, "claimant")?.to_string(),
                skill_id: arg_i64(event, "skill_id")?,
                status: "pending".to_string(),
            })
            .await?;
        Ok(())
    }
}
