//! Batch synchronizer driving fetch, decode, persist, dispatch and
//! checkpoint-advance for one source.
//!
//! Each cycle moves through `Idle -> Fetching -> Decoding -> Persisting ->
//! Dispatching -> Checkpointing -> Idle`; fetch and persistence failures
//! absorb into `Failed`, leaving the watermark untouched so the same range
//! is retried verbatim on the next cycle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use attest_fetch::chain::{decode::EventRegistry, source::LogSource};

use crate::{
    config::SyncServiceConfig,
    error::SyncError,
    metrics,
    projection::ProjectionRegistry,
    store::{Checkpoint, CheckpointStore, EventStore, NewEvent, ProjectionStore, StoredEvent},
};

/// The synchronizer's view of notification fan-out.
///
/// Dispatch is fire-and-forget: implementations hand the event to detached
/// delivery tasks so a slow consumer can never stall checkpoint
/// advancement.
pub trait FanoutSink: Send + Sync {
    /// Dispatches an applied event to every notification channel.
    fn dispatch(&self, event: &StoredEvent);
}

/// A [`FanoutSink`] that drops every event, for sources that index without
/// notifying.
pub struct NoFanout;

impl FanoutSink for NoFanout {
    fn dispatch(&self, _event: &StoredEvent) {}
}

/// Stages of one synchronization cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    /// Nothing in flight.
    Idle,
    /// Pulling logs from the chain source.
    Fetching,
    /// Decoding raw logs against the schema registry.
    Decoding,
    /// Upserting decoded events into the event store.
    Persisting,
    /// Applying projections and fanning out notifications.
    Dispatching,
    /// Advancing the watermark.
    Checkpointing,
    /// The cycle was abandoned; the watermark is unchanged.
    Failed,
}

impl std::fmt::Display for BatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BatchStage::Idle => "idle",
            BatchStage::Fetching => "fetching",
            BatchStage::Decoding => "decoding",
            BatchStage::Persisting => "persisting",
            BatchStage::Dispatching => "dispatching",
            BatchStage::Checkpointing => "checkpointing",
            BatchStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Counters summarizing one completed synchronization cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// First position of the synchronized range.
    pub from: u64,
    /// Last position of the synchronized range.
    pub to: u64,
    /// Raw logs returned by the source.
    pub fetched: usize,
    /// Logs skipped because they could not be decoded.
    pub skipped: usize,
    /// Events newly inserted into the event store.
    pub inserted: usize,
    /// Events run through projection handlers and marked applied.
    pub applied: usize,
}

/// Synchronizes one source contract against the event store.
///
/// A synchronizer is owned by exactly one sync worker; nothing else writes
/// the source's checkpoint.
pub struct SourceSynchronizer {
    /// Source contract address; doubles as the checkpoint key.
    address: String,
    /// Logical source name used in logs.
    name: String,
    /// Chain log source.
    fetcher: Arc<dyn LogSource>,
    /// Decoding schema registry.
    registry: Arc<EventRegistry>,
    /// Watermark storage.
    checkpoints: Arc<dyn CheckpointStore>,
    /// Raw event storage.
    events: Arc<dyn EventStore>,
    /// Projection handler registry.
    projections: Arc<ProjectionRegistry>,
    /// Projected entity storage handed to handlers.
    projection_store: Arc<dyn ProjectionStore>,
    /// Notification fan-out.
    fanout: Arc<dyn FanoutSink>,
    /// Sync service config data.
    config: SyncServiceConfig,
}

impl SourceSynchronizer {
    /// Creates a new SourceSynchronizer for `address`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: &str,
        name: &str,
        fetcher: Arc<dyn LogSource>,
        registry: Arc<EventRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        events: Arc<dyn EventStore>,
        projections: Arc<ProjectionRegistry>,
        projection_store: Arc<dyn ProjectionStore>,
        fanout: Arc<dyn FanoutSink>,
        config: SyncServiceConfig,
    ) -> Self {
        SourceSynchronizer {
            address: address.to_lowercase(),
            name: name.to_string(),
            fetcher,
            registry,
            checkpoints,
            events,
            projections,
            projection_store,
            fanout,
            config,
        }
    }

    /// Returns the source address the synchronizer is bound to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the logical source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs one synchronization cycle.
    ///
    /// Returns `Ok(None)` when the source has nothing new. On error the
    /// checkpoint's error fields are updated and the watermark is left
    /// untouched.
    pub async fn sync_batch(&self) -> Result<Option<BatchSummary>, SyncError> {
        let checkpoint = match self.checkpoints.get(&self.address).await {
            Ok(row) => row.unwrap_or_else(|| {
                Checkpoint::starting_at(&self.address, self.config.start_position)
            }),
            Err(error) => {
                metrics::record_sync_error("persistence");
                return Err(error.into());
            }
        };
        let last_processed = checkpoint.last_processed_position;
        match self.run_batch(last_processed).await {
            Ok(summary) => Ok(summary),
            Err(error) => Err(self.fail_batch(last_processed, error).await),
        }
    }

    /// Logs a stage transition of the batch state machine.
    fn enter_stage(&self, stage: BatchStage) {
        debug!(source = %self.name, stage = %stage, "Entering batch stage");
    }

    /// Drives the batch stages, bailing on the first fatal error.
    async fn run_batch(&self, last_processed: i64) -> Result<Option<BatchSummary>, SyncError> {
        let from = (last_processed + 1) as u64;

        self.enter_stage(BatchStage::Fetching);
        let head = self.fetcher.head_position().await?;
        let to = head.min(from.saturating_add(self.config.batch_size - 1));
        if from > to {
            debug!(source = %self.name, from, head, "Nothing new to sync");
            return Ok(None);
        }
        let logs = self.fetcher.fetch_logs(&self.address, from, to).await?;
        let fetched = logs.len();

        self.enter_stage(BatchStage::Decoding);
        let mut decoded = Vec::with_capacity(logs.len());
        let mut skipped = 0;
        for log in logs {
            match self.registry.decode(&log) {
                Ok(event) => decoded.push(event),
                Err(error) => {
                    skipped += 1;
                    metrics::record_decode_skipped(&self.address);
                    warn!(
                        source = %self.name,
                        position = log.position,
                        transaction_id = %log.transaction_id,
                        "Skipping undecodable log: {}",
                        error
                    );
                }
            }
        }

        self.enter_stage(BatchStage::Persisting);
        let mut inserted = 0;
        for event in decoded {
            if self.events.insert_if_absent(&NewEvent::from(event)).await? {
                inserted += 1;
            }
        }

        self.enter_stage(BatchStage::Dispatching);
        let unapplied = self
            .events
            .unapplied_in_range(&self.address, from as i64, to as i64)
            .await?;
        let mut applied = 0;
        for event in unapplied {
            let Some(handler) = self.projections.handler(&event.event_name) else {
                debug!(
                    source = %self.name,
                    event = %event.event_name,
                    "No handler registered; event stored as informational"
                );
                continue;
            };
            if let Err(error) = handler.apply(&event, self.projection_store.as_ref()).await {
                // Marked applied regardless: reprocessing a permanently
                // failing event next cycle would stall the stream.
                metrics::record_projection_skip(&event.event_name);
                warn!(
                    source = %self.name,
                    event = %event.event_name,
                    transaction_id = %event.transaction_id,
                    "Projection handler failed: {}",
                    error
                );
            }
            self.events
                .mark_applied(&event.transaction_id, event.sequence_in_transaction)
                .await?;
            applied += 1;
            metrics::record_event_processed(&self.address, &event.event_name);
            self.fanout.dispatch(&event);
        }

        self.enter_stage(BatchStage::Checkpointing);
        self.checkpoints.advance(&self.address, to as i64).await?;
        metrics::record_last_processed_position(&self.address, to);
        self.enter_stage(BatchStage::Idle);

        let summary = BatchSummary {
            from,
            to,
            fetched,
            skipped,
            inserted,
            applied,
        };
        info!(
            source = %self.name,
            from = summary.from,
            to = summary.to,
            fetched = summary.fetched,
            skipped = summary.skipped,
            inserted = summary.inserted,
            applied = summary.applied,
            "Batch synchronized"
        );
        Ok(Some(summary))
    }

    /// Records a failed cycle against the checkpoint and returns the error.
    async fn fail_batch(&self, last_processed: i64, error: SyncError) -> SyncError {
        metrics::record_sync_error(error.kind());
        warn!(
            source = %self.name,
            stage = %BatchStage::Failed,
            "Batch abandoned, will retry next cycle: {}",
            error
        );
        if let Err(record_error) = self
            .checkpoints
            .record_error(&self.address, last_processed, &error.to_string())
            .await
        {
            warn!(
                source = %self.name,
                "Failed to record sync error against checkpoint: {}",
                record_error
            );
        }
        error
    }
}
