//! Domain projection handler tests.
//!
//! Integration test rather than an in-crate module: the fixtures come from
//! `attest-testutils`, which depends on `attest-state`, so they can only link
//! against the ordinary library build.

use attest_state::error::ProjectionError;
use attest_state::projection::handlers::{ProfileCreated, SkillClaimed, SkillVerified};
use attest_state::projection::{ProjectionHandler, ProjectionRegistry};
use attest_state::store::ProjectionStore;
use attest_testutils::{stored_event, MemoryProjectionStore};
use serde_json::json;

const WALLET: &str = "0xbeef00000000000000000000000000000000beef";

#[tokio::test]
async fn profile_created_projects_a_profile_row() {
    let store = MemoryProjectionStore::new();
    let event = stored_event(
        "profile.created",
        json!({"wallet": WALLET, "handle": "alice", "metadata_uri": "ipfs://alice"}),
    );
    ProfileCreated.apply(&event, &store).await.unwrap();
    let profile = store.get_profile(WALLET).await.unwrap().unwrap();
    assert_eq!(profile.handle.as_deref(), Some("alice"));
    assert_eq!(profile.metadata_uri.as_deref(), Some("ipfs://alice"));
}

#[tokio::test]
async fn skill_claimed_without_profile_is_skipped() {
    let store = MemoryProjectionStore::new();
    let event = stored_event(
        "skill.claimed",
        json!({"wallet": WALLET, "skill_id": 7, "name": "rust"}),
    );
    SkillClaimed.apply(&event, &store).await.unwrap();
    assert!(store.get_skill(7).await.unwrap().is_none());
}

#[tokio::test]
async fn skill_claimed_with_profile_projects_a_skill_row() {
    let store = MemoryProjectionStore::new();
    ProfileCreated
        .apply(
            &stored_event("profile.created", json!({"wallet": WALLET})),
            &store,
        )
        .await
        .unwrap();
    SkillClaimed
        .apply(
            &stored_event(
                "skill.claimed",
                json!({"wallet": WALLET, "skill_id": 7, "name": "rust"}),
            ),
            &store,
        )
        .await
        .unwrap();
    let skill = store.get_skill(7).await.unwrap().unwrap();
    assert_eq!(skill.name, "rust");
    assert!(!skill.verified);
}

#[tokio::test]
async fn skill_verified_flips_the_verified_flag() {
    let store = MemoryProjectionStore::new();
    ProfileCreated
        .apply(
            &stored_event("profile.created", json!({"wallet": WALLET})),
            &store,
        )
        .await
        .unwrap();
    SkillClaimed
        .apply(
            &stored_event(
                "skill.claimed",
                json!({"wallet": WALLET, "skill_id": 7, "name": "rust"}),
            ),
            &store,
        )
        .await
        .unwrap();
    SkillVerified
        .apply(
            &stored_event("skill.verified", json!({"skill_id": 7, "verifier": WALLET})),
            &store,
        )
        .await
        .unwrap();
    assert!(store.get_skill(7).await.unwrap().unwrap().verified);
}

#[tokio::test]
async fn malformed_payload_is_an_error() {
    let store = MemoryProjectionStore::new();
    let event = stored_event("profile.created", json!({"handle": "alice"}));
    assert!(matches!(
        ProfileCreated.apply(&event, &store).await,
        Err(ProjectionError::Malformed(_))
    ));
}

#[test]
fn default_registry_covers_every_domain_event() {
    let registry = ProjectionRegistry::with_defaults();
    for event in [
        "profile.created",
        "profile.updated",
        "skill.claimed",
        "skill.verified",
        "endorsement.created",
        "verifier.registered",
        "bounty_pool.created",
        "bounty.claimed",
    ] {
        assert!(registry.handler(event).is_some(), "missing handler: {event}");
    }
    assert!(registry.handler("unknown.event").is_none());
}
