//! Attest indexer implementation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::info;

use attest_fetch::{
    chain::decode::EventRegistry,
    jsonrpc::connector::{test_source_and_return_url, JsonRpcConnector},
};
use attest_notify::{
    dispatch::Fanout,
    email::{EmailConfig, EmailNotifier},
    inapp::InAppNotifier,
    webhook::{WebhookConfig, WebhookDispatcher},
};
use attest_state::{
    config::SyncServiceConfig,
    projection::ProjectionRegistry,
    scheduler::{Scheduler, SchedulerStatus},
    status::{AtomicStatus, StatusType},
    store::{
        postgres::{
            connect, PgCheckpointStore, PgEventStore, PgNotificationStore, PgProjectionStore,
            PgSubscriptionStore,
        },
        CheckpointStore, EventStore, NotificationStore, ProjectionStore, SubscriptionStore,
    },
    sync::{FanoutSink, SourceSynchronizer},
};

use crate::{config::IndexerConfig, error::IndexerError};

/// Holds the status of the indexer and all its components.
#[derive(Debug, Clone)]
pub struct IndexerStatus {
    indexer_status: AtomicStatus,
    scheduler_status: SchedulerStatus,
}

impl IndexerStatus {
    /// Creates a new IndexerStatus for `sources` registered sources.
    pub fn new(sources: usize) -> Self {
        IndexerStatus {
            indexer_status: AtomicStatus::new(StatusType::Offline.into()),
            scheduler_status: SchedulerStatus::new(sources),
        }
    }
}

/// Attest chain event indexer.
pub struct Indexer {
    /// Indexer configuration data.
    config: IndexerConfig,
    /// Per-source sync scheduler.
    scheduler: Option<Scheduler>,
    /// Indexer status.
    status: IndexerStatus,
    /// Online status of the indexer.
    online: Arc<AtomicBool>,
}

impl Indexer {
    /// Starts the indexer service.
    pub async fn start(config: IndexerConfig) -> Result<(), IndexerError> {
        let online = Arc::new(AtomicBool::new(true));
        set_ctrlc(online.clone());
        info!("Launching Attest indexer..");
        let indexer = Indexer::new(config, online).await?;
        indexer.serve().await?.await?
    }

    /// Creates a new Indexer: connects to the database and the chain log
    /// source, loads the decoding schemas, wires the fan-out channels and
    /// builds one synchronizer per registered source.
    pub async fn new(
        config: IndexerConfig,
        online: Arc<AtomicBool>,
    ) -> Result<Self, IndexerError> {
        config.check_config()?;

        if let Some(port) = config.metrics_port {
            install_metrics_exporter(port)?;
        }

        let registry = Arc::new(EventRegistry::from_metadata_file(&config.registry_path)?);
        let addresses = registry.addresses();
        if addresses.is_empty() {
            return Err(IndexerError::ConfigError(
                "Contract metadata registers no sources.".to_string(),
            ));
        }
        info!("Loaded decoding schemas for {} source(s).", addresses.len());

        info!("Checking connection with the chain log source..");
        let source_url = test_source_and_return_url(
            &config.source_rpc_url,
            config.source_rpc_user.clone(),
            config.source_rpc_password.clone(),
        )
        .await?;
        info!(" - Connected to the log source at {}.", source_url);
        let connector = Arc::new(JsonRpcConnector::new(
            source_url,
            config.source_rpc_user.clone(),
            config.source_rpc_password.clone(),
        )?);

        info!("Connecting to PostgreSQL and applying schema..");
        let pool = connect(&config.database_url(), config.db_max_connections).await?;

        let checkpoints: Arc<dyn CheckpointStore> =
            Arc::new(PgCheckpointStore::new(pool.clone()));
        let events: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool.clone()));
        let projections: Arc<dyn ProjectionStore> =
            Arc::new(PgProjectionStore::new(pool.clone()));
        let subscriptions: Arc<dyn SubscriptionStore> =
            Arc::new(PgSubscriptionStore::new(pool.clone()));
        let notifications: Arc<dyn NotificationStore> =
            Arc::new(PgNotificationStore::new(pool));

        let fanout: Arc<dyn FanoutSink> = Arc::new(Fanout::new(
            WebhookDispatcher::new(
                subscriptions,
                WebhookConfig::new(config.webhook_max_attempts, config.webhook_retry_delay_ms),
            )?,
            InAppNotifier::new(notifications, projections.clone()),
            EmailNotifier::new(
                EmailConfig::new(
                    config.smtp_host.clone(),
                    config.smtp_port,
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                    config.email_from_address.clone(),
                ),
                projections.clone(),
            )?,
        ));

        let sync_config = SyncServiceConfig::new(
            config.start_position,
            config.batch_size,
            config.poll_interval_secs,
        );
        let projection_registry = Arc::new(ProjectionRegistry::with_defaults());
        let synchronizers: Vec<SourceSynchronizer> = addresses
            .iter()
            .map(|address| {
                SourceSynchronizer::new(
                    address,
                    registry.source_name(address).unwrap_or(address.as_str()),
                    connector.clone(),
                    registry.clone(),
                    checkpoints.clone(),
                    events.clone(),
                    projection_registry.clone(),
                    projections.clone(),
                    fanout.clone(),
                    sync_config.clone(),
                )
            })
            .collect();

        let status = IndexerStatus::new(synchronizers.len());
        status.indexer_status.store(StatusType::Spawning.into());
        let scheduler = Scheduler::spawn(
            synchronizers,
            sync_config.poll_interval,
            status.scheduler_status.clone(),
            online.clone(),
        )?;

        Ok(Indexer {
            config,
            scheduler: Some(scheduler),
            status,
            online,
        })
    }

    /// Starts the indexer service and returns its JoinHandle.
    pub async fn serve(
        mut self,
    ) -> Result<tokio::task::JoinHandle<Result<(), IndexerError>>, IndexerError> {
        let scheduler = self.scheduler.take().ok_or(IndexerError::MiscIndexerError(
            "Scheduler missing! Fatal error.".to_string(),
        ))?;
        Ok(tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(50));
            let scheduler_handle = scheduler.serve();
            self.status.indexer_status.store(StatusType::Ready.into());
            info!(
                "Attest indexer ready, polling every {}s.",
                self.config.poll_interval_secs.unwrap_or(15)
            );
            loop {
                interval.tick().await;
                if self.check_for_shutdown() {
                    self.status.indexer_status.store(StatusType::Closing.into());
                    self.status
                        .scheduler_status
                        .scheduler_status
                        .store(StatusType::Closing.into());
                    // The scheduler joins its workers; a batch in flight
                    // finishes before the worker exits.
                    scheduler_handle.await??;
                    self.status.indexer_status.store(StatusType::Offline.into());
                    info!("Attest indexer stopped.");
                    return Ok(());
                }
            }
        }))
    }

    /// Checks the indexer's online status and internal status for a
    /// closure signal.
    fn check_for_shutdown(&self) -> bool {
        if self.status() >= StatusType::Closing.into() {
            return true;
        }
        if !self.check_online() {
            return true;
        }
        false
    }

    /// Sets the indexer to close gracefully.
    pub fn shutdown(&mut self) {
        self.status.indexer_status.store(StatusType::Closing.into())
    }

    /// Returns the indexer's current status usize.
    pub fn status(&self) -> usize {
        self.status.indexer_status.load()
    }

    /// Returns the indexer's current statustype.
    pub fn statustype(&self) -> StatusType {
        StatusType::from(self.status())
    }

    /// Check the online status on the indexer.
    fn check_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Installs the Prometheus pull exporter on `port`.
fn install_metrics_exporter(port: u16) -> Result<(), IndexerError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(std::net::SocketAddr::new(
            std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port,
        ))
        .install()
        .map_err(|error| IndexerError::MetricsError(error.to_string()))?;
    info!("Prometheus exporter listening on port {}.", port);
    Ok(())
}

/// Flips the online flag on ctrl-c so components shut down gracefully.
fn set_ctrlc(online: Arc<AtomicBool>) {
    if let Err(error) = ctrlc::set_handler(move || {
        online.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Failed to install ctrl-c handler: {}", error);
    }
}
