//! Scheduler supervision tests.
//!
//! Integration test rather than an in-crate module: the fixtures come from
//! `attest-testutils`, which depends on `attest-state`, so they can only link
//! against the ordinary library build.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use attest_state::config::SyncServiceConfig;
use attest_state::projection::ProjectionRegistry;
use attest_state::scheduler::{Scheduler, SchedulerStatus};
use attest_state::status::StatusType;
use attest_state::store::CheckpointStore;
use attest_state::sync::SourceSynchronizer;
use attest_testutils::{
    fixtures, MemoryCheckpointStore, MemoryEventStore, MemoryProjectionStore, MockLogSource,
    RecordingFanout,
};

const WALLET: &str = "0xaaaa000000000000000000000000000000000001";

fn synchronizer(
    source: Arc<MockLogSource>,
    checkpoints: Arc<MemoryCheckpointStore>,
) -> SourceSynchronizer {
    SourceSynchronizer::new(
        fixtures::SOURCE_ADDRESS,
        "attest-registry",
        source,
        Arc::new(fixtures::registry()),
        checkpoints,
        Arc::new(MemoryEventStore::new()),
        Arc::new(ProjectionRegistry::with_defaults()),
        Arc::new(MemoryProjectionStore::new()),
        Arc::new(RecordingFanout::new()),
        SyncServiceConfig::new(Some(100), Some(100), None),
    )
}

#[tokio::test]
async fn scheduler_drives_workers_and_shuts_down_cleanly() {
    let source = Arc::new(MockLogSource::new());
    source.set_head(150);
    source.push_log(fixtures::profile_created_log(110, "0xtx1", 0, WALLET, "alice"));
    let checkpoints = Arc::new(MemoryCheckpointStore::new());

    let status = SchedulerStatus::new(1);
    let online = Arc::new(AtomicBool::new(true));
    let scheduler = Scheduler::spawn(
        vec![synchronizer(source, checkpoints.clone())],
        std::time::Duration::from_millis(10),
        status.clone(),
        online,
    )
    .unwrap();
    let handle = scheduler.serve();

    // Give the worker a few ticks to sync the seeded batch.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    status.scheduler_status.store(StatusType::Closing.into());
    handle.await.unwrap().unwrap();

    let checkpoint = checkpoints
        .get(fixtures::SOURCE_ADDRESS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_position, 150);
    assert_eq!(
        status.worker_statuses[0].load(),
        usize::from(StatusType::Offline)
    );
    assert_eq!(
        status.scheduler_status.load(),
        usize::from(StatusType::Offline)
    );
}

#[tokio::test]
async fn dropping_the_online_flag_stops_the_scheduler() {
    let source = Arc::new(MockLogSource::new());
    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let status = SchedulerStatus::new(1);
    let online = Arc::new(AtomicBool::new(true));
    let scheduler = Scheduler::spawn(
        vec![synchronizer(source, checkpoints)],
        std::time::Duration::from_millis(10),
        status,
        online.clone(),
    )
    .unwrap();
    let handle = scheduler.serve();

    online.store(false, Ordering::SeqCst);
    handle.await.unwrap().unwrap();
}

#[test]
fn scheduler_requires_at_least_one_source() {
    let result = Scheduler::spawn(
        Vec::new(),
        std::time::Duration::from_secs(1),
        SchedulerStatus::new(0),
        Arc::new(AtomicBool::new(true)),
    );
    assert!(result.is_err());
}
