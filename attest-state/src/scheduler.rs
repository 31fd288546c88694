//! Per-source sync workers and the scheduler supervising them.
//!
//! Every registered source gets exactly one worker, which makes the
//! single-writer invariant on its checkpoint structural: concurrent
//! synchronizer runs for the same source cannot exist.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{info, warn};

use crate::{
    error::SyncError,
    status::{AtomicStatus, StatusType},
    sync::SourceSynchronizer,
};

/// A sync worker owning one source's synchronizer.
pub struct SyncWorker {
    /// The source synchronizer; the worker is its only driver.
    synchronizer: Arc<SourceSynchronizer>,
    /// Poll interval between sync cycles.
    poll_interval: std::time::Duration,
    /// Thread safe worker status.
    status: AtomicStatus,
    /// Represents the online status of the indexer.
    online: Arc<AtomicBool>,
}

impl SyncWorker {
    /// Creates a new SyncWorker.
    pub fn new(
        synchronizer: SourceSynchronizer,
        poll_interval: std::time::Duration,
        status: AtomicStatus,
        online: Arc<AtomicBool>,
    ) -> Self {
        SyncWorker {
            synchronizer: Arc::new(synchronizer),
            poll_interval,
            status,
            online,
        }
    }

    /// Starts the worker's sync routine.
    ///
    /// A batch in flight always runs to completion or failure before the
    /// shutdown check, so the worker never exits mid-checkpoint.
    pub fn serve(self) -> tokio::task::JoinHandle<Result<(), SyncError>> {
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            self.status.store(StatusType::Ready.into());
            info!(source = %self.synchronizer.name(), "Sync worker online");
            loop {
                interval.tick().await;
                if self.check_for_shutdown() {
                    self.status.store(StatusType::Offline.into());
                    info!(source = %self.synchronizer.name(), "Sync worker offline");
                    return Ok(());
                }
                self.status.store(StatusType::Syncing.into());
                match self.synchronizer.sync_batch().await {
                    Ok(_) => {
                        self.status.store(StatusType::Ready.into());
                    }
                    Err(error) => {
                        // Abandoned batches retry on the next tick.
                        self.status.store(StatusType::RecoverableError.into());
                        warn!(
                            source = %self.synchronizer.name(),
                            "Sync cycle failed: {}",
                            error
                        );
                    }
                }
            }
        })
    }

    /// Checks the indexer's online status and the worker's own status for a
    /// closure signal.
    fn check_for_shutdown(&self) -> bool {
        if self.status.load() >= StatusType::Closing.into() {
            return true;
        }
        if !self.online.load(Ordering::SeqCst) {
            return true;
        }
        false
    }
}

/// Holds the status of the scheduler and its workers.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// Status of the scheduler itself.
    pub scheduler_status: AtomicStatus,
    /// Status of each sync worker, in registration order.
    pub worker_statuses: Vec<AtomicStatus>,
}

impl SchedulerStatus {
    /// Creates a SchedulerStatus for `workers` sources.
    pub fn new(workers: usize) -> Self {
        SchedulerStatus {
            scheduler_status: AtomicStatus::new(StatusType::Offline.into()),
            worker_statuses: vec![AtomicStatus::new(StatusType::Offline.into()); workers],
        }
    }
}

/// Periodic scheduler running one sync worker per registered source.
pub struct Scheduler {
    /// Workers not yet started.
    workers: Vec<SyncWorker>,
    /// Scheduler status.
    status: SchedulerStatus,
    /// Represents the online status of the indexer.
    online: Arc<AtomicBool>,
}

impl Scheduler {
    /// Creates a Scheduler with one worker per synchronizer.
    pub fn spawn(
        synchronizers: Vec<SourceSynchronizer>,
        poll_interval: std::time::Duration,
        status: SchedulerStatus,
        online: Arc<AtomicBool>,
    ) -> Result<Self, SyncError> {
        if synchronizers.is_empty() {
            return Err(SyncError::Custom(
                "Cannot start scheduler with no registered sources.".to_string(),
            ));
        }
        if status.worker_statuses.len() != synchronizers.len() {
            return Err(SyncError::Custom(
                "SchedulerStatus sized for a different number of sources.".to_string(),
            ));
        }
        status.scheduler_status.store(StatusType::Spawning.into());
        let workers = synchronizers
            .into_iter()
            .zip(status.worker_statuses.iter())
            .map(|(synchronizer, worker_status)| {
                SyncWorker::new(
                    synchronizer,
                    poll_interval,
                    worker_status.clone(),
                    online.clone(),
                )
            })
            .collect();
        Ok(Scheduler {
            workers,
            status,
            online,
        })
    }

    /// Starts every worker and supervises them until shutdown.
    pub fn serve(mut self) -> tokio::task::JoinHandle<Result<(), SyncError>> {
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(50));
            let worker_handles: Vec<_> = self
                .workers
                .drain(..)
                .map(|worker| worker.serve())
                .collect();
            self.status.scheduler_status.store(StatusType::Ready.into());
            loop {
                interval.tick().await;
                if self.check_for_shutdown() {
                    self.status
                        .scheduler_status
                        .store(StatusType::Closing.into());
                    for worker_status in &self.status.worker_statuses {
                        worker_status.store(StatusType::Closing.into());
                    }
                    for handle in worker_handles {
                        match handle.await {
                            Ok(Ok(())) => {}
                            Ok(Err(error)) => {
                                warn!("Sync worker returned error on shutdown: {}", error);
                            }
                            Err(error) => {
                                warn!("Sync worker task panicked: {}", error);
                            }
                        }
                    }
                    self.status
                        .scheduler_status
                        .store(StatusType::Offline.into());
                    return Ok(());
                }
            }
        })
    }

    /// Sets the scheduler to close gracefully.
    pub fn shutdown(&mut self) {
        self.status
            .scheduler_status
            .store(StatusType::Closing.into());
    }

    /// Checks the indexer's online status and the scheduler's own status
    /// for a closure signal.
    fn check_for_shutdown(&self) -> bool {
        if self.status.scheduler_status.load() >= StatusType::Closing.into() {
            return true;
        }
        if !self.online.load(Ordering::SeqCst) {
            return true;
        }
        false
    }
}
