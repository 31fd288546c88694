//! Batch synchronizer scenarios.
//!
//! Lives here rather than inside `src/sync.rs` because the fixtures come from
//! `attest-testutils`, which depends on `attest-state`; linking those helpers
//! into an in-crate `#[cfg(test)]` build would pull a second copy of this
//! crate into the graph. An integration test links the ordinary library.

use std::sync::Arc;

use attest_state::config::SyncServiceConfig;
use attest_state::error::SyncError;
use attest_state::projection::ProjectionRegistry;
use attest_state::store::{CheckpointStore, ProjectionStore};
use attest_state::sync::SourceSynchronizer;
use attest_testutils::{
    fixtures, MemoryCheckpointStore, MemoryEventStore, MemoryProjectionStore, MockLogSource,
    RecordingFanout,
};

const WALLET_A: &str = "0xaaaa000000000000000000000000000000000001";
const WALLET_B: &str = "0xaaaa000000000000000000000000000000000002";
const WALLET_C: &str = "0xaaaa000000000000000000000000000000000003";

struct Harness {
    source: Arc<MockLogSource>,
    checkpoints: Arc<MemoryCheckpointStore>,
    events: Arc<MemoryEventStore>,
    projections: Arc<MemoryProjectionStore>,
    fanout: Arc<RecordingFanout>,
    synchronizer: SourceSynchronizer,
}

fn harness(batch_size: u64) -> Harness {
    let source = Arc::new(MockLogSource::new());
    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let events = Arc::new(MemoryEventStore::new());
    let projections = Arc::new(MemoryProjectionStore::new());
    let fanout = Arc::new(RecordingFanout::new());
    let synchronizer = SourceSynchronizer::new(
        fixtures::SOURCE_ADDRESS,
        "attest-registry",
        source.clone(),
        Arc::new(fixtures::registry()),
        checkpoints.clone(),
        events.clone(),
        Arc::new(ProjectionRegistry::with_defaults()),
        projections.clone(),
        fanout.clone(),
        SyncServiceConfig::new(Some(100), Some(batch_size), None),
    );
    Harness {
        source,
        checkpoints,
        events,
        projections,
        fanout,
        synchronizer,
    }
}

fn seed_three_profiles(harness: &Harness) {
    harness.source.set_head(150);
    harness.source.push_log(fixtures::profile_created_log(
        110, "0xtx1", 0, WALLET_A, "alice",
    ));
    harness.source.push_log(fixtures::profile_created_log(
        120, "0xtx2", 0, WALLET_B, "bob",
    ));
    harness.source.push_log(fixtures::profile_created_log(
        130, "0xtx3", 0, WALLET_C, "carol",
    ));
}

#[tokio::test]
async fn scenario_a_projects_profiles_and_advances_checkpoint() {
    let harness = harness(51);
    seed_three_profiles(&harness);

    let summary = harness.synchronizer.sync_batch().await.unwrap().unwrap();
    assert_eq!((summary.from, summary.to), (100, 150));
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.applied, 3);

    for wallet in [WALLET_A, WALLET_B, WALLET_C] {
        assert!(harness.projections.get_profile(wallet).await.unwrap().is_some());
    }
    let checkpoint = harness
        .checkpoints
        .get(fixtures::SOURCE_ADDRESS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_position, 150);
    assert_eq!(checkpoint.error_count, 0);
}

#[tokio::test]
async fn scenario_b_rerunning_the_same_range_is_idempotent() {
    let harness = harness(51);
    seed_three_profiles(&harness);

    harness.synchronizer.sync_batch().await.unwrap().unwrap();
    // Simulate a lost watermark so the exact same range replays.
    harness.checkpoints.reset(fixtures::SOURCE_ADDRESS);
    let summary = harness.synchronizer.sync_batch().await.unwrap().unwrap();

    assert_eq!((summary.from, summary.to), (100, 150));
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.applied, 0);
    assert_eq!(harness.events.len(), 3);
    assert_eq!(harness.projections.profile_count(), 3);
    let checkpoint = harness
        .checkpoints
        .get(fixtures::SOURCE_ADDRESS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_position, 150);
}

#[tokio::test]
async fn scenario_c_child_without_parent_is_stored_but_not_projected() {
    let harness = harness(51);
    harness.source.set_head(150);
    harness.source.push_log(fixtures::skill_claimed_log(
        110, "0xtx1", 0, WALLET_A, 7, "rust",
    ));

    harness.synchronizer.sync_batch().await.unwrap().unwrap();

    let event = harness.events.by_key("0xtx1", 0).unwrap();
    assert!(event.applied);
    assert!(harness.projections.get_skill(7).await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_d_fetch_failure_leaves_checkpoint_untouched() {
    let harness = harness(51);
    seed_three_profiles(&harness);
    harness.synchronizer.sync_batch().await.unwrap().unwrap();

    harness.source.set_head(200);
    harness.source.fail_next_fetch("connection reset");
    let error = harness.synchronizer.sync_batch().await.unwrap_err();
    assert!(matches!(error, SyncError::Fetch(_)));

    let checkpoint = harness
        .checkpoints
        .get(fixtures::SOURCE_ADDRESS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_position, 150);
    assert_eq!(checkpoint.error_count, 1);
    assert!(checkpoint.last_error.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn events_apply_in_position_then_sequence_order() {
    let harness = harness(51);
    harness.source.set_head(150);
    // Pushed out of order on purpose.
    harness.source.push_log(fixtures::profile_created_log(
        110, "0xtx1", 1, WALLET_B, "bob",
    ));
    harness.source.push_log(fixtures::profile_created_log(
        110, "0xtx1", 0, WALLET_A, "alice",
    ));

    harness.synchronizer.sync_batch().await.unwrap().unwrap();

    let dispatched = harness.fanout.dispatched();
    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].sequence_in_transaction, 0);
    assert_eq!(dispatched[1].sequence_in_transaction, 1);
}

#[tokio::test]
async fn one_undecodable_log_does_not_poison_the_batch() {
    let harness = harness(51);
    seed_three_profiles(&harness);
    harness.source.push_log(fixtures::garbage_log(140, "0xtx4", 0));

    let summary = harness.synchronizer.sync_batch().await.unwrap().unwrap();
    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.applied, 3);
    assert_eq!(harness.projections.profile_count(), 3);
    let checkpoint = harness
        .checkpoints
        .get(fixtures::SOURCE_ADDRESS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_position, 150);
}

#[tokio::test]
async fn unknown_event_type_is_stored_but_never_applied() {
    let harness = harness(51);
    harness.source.set_head(150);
    harness.source.push_log(fixtures::unknown_event_log(110, "0xtx1", 0));

    let summary = harness.synchronizer.sync_batch().await.unwrap().unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.applied, 0);
    let event = harness.events.by_key("0xtx1", 0).unwrap();
    assert!(!event.applied);
    assert!(harness.fanout.dispatched().is_empty());
}

#[tokio::test]
async fn handler_failure_still_marks_the_event_applied() {
    let harness = harness(51);
    harness.source.set_head(150);
    // profile.created without its wallet argument: malformed payload.
    harness.source.push_log(fixtures::malformed_profile_log(110, "0xtx1", 0));

    let summary = harness.synchronizer.sync_batch().await.unwrap().unwrap();
    assert_eq!(summary.applied, 1);
    assert!(harness.events.by_key("0xtx1", 0).unwrap().applied);
    assert_eq!(harness.projections.profile_count(), 0);
}

#[tokio::test]
async fn checkpoint_advance_never_decreases() {
    let checkpoints = MemoryCheckpointStore::new();
    checkpoints.advance("0xsource", 150).await.unwrap();
    checkpoints.advance("0xsource", 100).await.unwrap();
    let checkpoint = checkpoints.get("0xsource").await.unwrap().unwrap();
    assert_eq!(checkpoint.last_processed_position, 150);
}

#[tokio::test]
async fn no_op_when_head_is_behind_the_watermark() {
    let harness = harness(51);
    seed_three_profiles(&harness);
    harness.synchronizer.sync_batch().await.unwrap().unwrap();

    assert!(harness.synchronizer.sync_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn range_is_clamped_to_the_batch_size() {
    let harness = harness(10);
    harness.source.set_head(1_000);

    let summary = harness.synchronizer.sync_batch().await.unwrap().unwrap();
    assert_eq!((summary.from, summary.to), (100, 109));
}
