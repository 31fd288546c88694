//! In-memory storage ports, a scripted mock log source and raw log
//! fixtures used across Attest's test suites.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicI64, AtomicU64, Ordering},
    Mutex,
};

use async_trait::async_trait;
use chrono::Utc;

use attest_fetch::chain::{
    log::RawLog,
    source::{LogSource, LogSourceError},
};
use attest_state::{
    error::StoreError,
    store::{
        BountyClaim, BountyPool, Checkpoint, CheckpointStore, Endorsement, EventStore, NewEvent,
        NewNotification, NotificationStore, Profile, ProjectionStore, Skill, StoredEvent,
        SubscriptionStore, Verifier, WebhookDelivery, WebhookSubscription,
    },
    sync::FanoutSink,
};

pub mod fixtures;

/// Builds a stored event row with the given name and payload.
pub fn stored_event(event_name: &str, payload: serde_json::Value) -> StoredEvent {
    StoredEvent {
        id: 1,
        event_name: event_name.to_string(),
        source_address: fixtures::SOURCE_ADDRESS.to_string(),
        position: 100,
        transaction_id: "0xtx-test".to_string(),
        sequence_in_transaction: 0,
        payload,
        applied: false,
        created_at: Utc::now(),
    }
}

/// In-memory checkpoint store.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    rows: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty MemoryCheckpointStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the checkpoint row for `source_id`, simulating a lost
    /// watermark.
    pub fn reset(&self, source_id: &str) {
        self.rows.lock().unwrap().remove(source_id);
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, source_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.rows.lock().unwrap().get(source_id).cloned())
    }

    async fn advance(&self, source_id: &str, position: i64) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(source_id.to_string()).or_insert_with(|| Checkpoint {
            source_id: source_id.to_string(),
            last_processed_position: position,
            last_processed_at: Utc::now(),
            error_count: 0,
            last_error: None,
        });
        row.last_processed_position = row.last_processed_position.max(position);
        row.last_processed_at = Utc::now();
        Ok(())
    }

    async fn record_error(
        &self,
        source_id: &str,
        position: i64,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(source_id.to_string()).or_insert_with(|| Checkpoint {
            source_id: source_id.to_string(),
            last_processed_position: position,
            last_processed_at: Utc::now(),
            error_count: 0,
            last_error: None,
        });
        row.error_count += 1;
        row.last_error = Some(error.to_string());
        Ok(())
    }
}

/// In-memory raw event store.
#[derive(Default)]
pub struct MemoryEventStore {
    rows: Mutex<Vec<StoredEvent>>,
    next_id: AtomicI64,
}

impl MemoryEventStore {
    /// Creates an empty MemoryEventStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored events.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Returns true when no events are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the event with the given natural key, if stored.
    pub fn by_key(&self, transaction_id: &str, sequence: i64) -> Option<StoredEvent> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| {
                row.transaction_id == transaction_id && row.sequence_in_transaction == sequence
            })
            .cloned()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_if_absent(&self, event: &NewEvent) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let exists = rows.iter().any(|row| {
            row.transaction_id == event.transaction_id
                && row.sequence_in_transaction == event.sequence_in_transaction
        });
        if exists {
            return Ok(false);
        }
        rows.push(StoredEvent {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            event_name: event.event_name.clone(),
            source_address: event.source_address.clone(),
            position: event.position,
            transaction_id: event.transaction_id.clone(),
            sequence_in_transaction: event.sequence_in_transaction,
            payload: event.payload.clone(),
            applied: false,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn unapplied_in_range(
        &self,
        source_address: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let mut rows: Vec<StoredEvent> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| {
                row.source_address == source_address
                    && row.position >= from
                    && row.position <= to
                    && !row.applied
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.position, row.sequence_in_transaction));
        Ok(rows)
    }

    async fn mark_applied(
        &self,
        transaction_id: &str,
        sequence_in_transaction: i64,
    ) -> Result<(), StoreError> {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.transaction_id == transaction_id
                && row.sequence_in_transaction == sequence_in_transaction
            {
                row.applied = true;
            }
        }
        Ok(())
    }
}

/// In-memory projection store.
#[derive(Default)]
pub struct MemoryProjectionStore {
    profiles: Mutex<HashMap<String, Profile>>,
    skills: Mutex<Vec<Skill>>,
    endorsements: Mutex<Vec<Endorsement>>,
    verifiers: Mutex<HashMap<String, Verifier>>,
    pools: Mutex<Vec<BountyPool>>,
    claims: Mutex<Vec<BountyClaim>>,
}

impl MemoryProjectionStore {
    /// Creates an empty MemoryProjectionStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of projected profiles.
    pub fn profile_count(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }

    /// Returns the projected skills in insertion order.
    pub fn skills(&self) -> Vec<Skill> {
        self.skills.lock().unwrap().clone()
    }

    /// Returns the projected endorsements in insertion order.
    pub fn endorsements(&self) -> Vec<Endorsement> {
        self.endorsements.lock().unwrap().clone()
    }

    /// Returns the projected bounty claims in insertion order.
    pub fn bounty_claims(&self) -> Vec<BountyClaim> {
        self.claims.lock().unwrap().clone()
    }

    /// Sets a profile's contact email, standing in for the out-of-scope
    /// profile settings surface.
    pub fn set_contact_email(&self, wallet_address: &str, email: &str) {
        if let Some(profile) = self.profiles.lock().unwrap().get_mut(wallet_address) {
            profile.contact_email = Some(email.to_string());
        }
    }
}

#[async_trait]
impl ProjectionStore for MemoryProjectionStore {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.wallet_address.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile_metadata(
        &self,
        wallet_address: &str,
        handle: Option<&str>,
        metadata_uri: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.get_mut(wallet_address) {
            Some(profile) => {
                if let Some(handle) = handle {
                    profile.handle = Some(handle.to_string());
                }
                if let Some(metadata_uri) = metadata_uri {
                    profile.metadata_uri = Some(metadata_uri.to_string());
                }
                profile.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_profile(&self, wallet_address: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.lock().unwrap().get(wallet_address).cloned())
    }

    async fn insert_skill(&self, skill: &Skill) -> Result<(), StoreError> {
        let mut skills = self.skills.lock().unwrap();
        if !skills.iter().any(|row| row.skill_id == skill.skill_id) {
            skills.push(skill.clone());
        }
        Ok(())
    }

    async fn get_skill(&self, skill_id: i64) -> Result<Option<Skill>, StoreError> {
        Ok(self
            .skills
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.skill_id == skill_id)
            .cloned())
    }

    async fn set_skill_verified(&self, skill_id: i64) -> Result<bool, StoreError> {
        for row in self.skills.lock().unwrap().iter_mut() {
            if row.skill_id == skill_id {
                row.verified = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn insert_endorsement(&self, endorsement: &Endorsement) -> Result<(), StoreError> {
        let mut endorsements = self.endorsements.lock().unwrap();
        if !endorsements
            .iter()
            .any(|row| row.endorsement_id == endorsement.endorsement_id)
        {
            endorsements.push(endorsement.clone());
        }
        Ok(())
    }

    async fn upsert_verifier(&self, verifier: &Verifier) -> Result<(), StoreError> {
        self.verifiers
            .lock()
            .unwrap()
            .insert(verifier.wallet_address.clone(), verifier.clone());
        Ok(())
    }

    async fn insert_bounty_pool(&self, pool: &BountyPool) -> Result<(), StoreError> {
        let mut pools = self.pools.lock().unwrap();
        if !pools.iter().any(|row| row.pool_id == pool.pool_id) {
            pools.push(pool.clone());
        }
        Ok(())
    }

    async fn get_bounty_pool(&self, pool_id: i64) -> Result<Option<BountyPool>, StoreError> {
        Ok(self
            .pools
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.pool_id == pool_id)
            .cloned())
    }

    async fn insert_bounty_claim(&self, claim: &BountyClaim) -> Result<(), StoreError> {
        let mut claims = self.claims.lock().unwrap();
        if !claims.iter().any(|row| row.claim_id == claim.claim_id) {
            claims.push(claim.clone());
        }
        Ok(())
    }
}

/// In-memory webhook subscription store and delivery audit trail.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<Vec<WebhookSubscription>>,
    deliveries: Mutex<Vec<WebhookDelivery>>,
}

impl MemorySubscriptionStore {
    /// Creates an empty MemorySubscriptionStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription.
    pub fn add_subscription(&self, subscription: WebhookSubscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }

    /// Returns the recorded delivery attempts in append order.
    pub fn deliveries(&self) -> Vec<WebhookDelivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn active_subscriptions_for(
        &self,
        event_name: &str,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|subscription| subscription.is_active && subscription.matches(event_name))
            .cloned()
            .collect())
    }

    async fn append_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        self.deliveries.lock().unwrap().push(delivery.clone());
        Ok(())
    }
}

/// In-memory in-app notification store.
#[derive(Default)]
pub struct MemoryNotificationStore {
    rows: Mutex<Vec<NewNotification>>,
}

impl MemoryNotificationStore {
    /// Creates an empty MemoryNotificationStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the created notifications in insertion order.
    pub fn notifications(&self) -> Vec<NewNotification> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, notification: &NewNotification) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Scripted log source returning pushed logs and a configurable head.
#[derive(Default)]
pub struct MockLogSource {
    logs: Mutex<Vec<RawLog>>,
    head: AtomicU64,
    fail_next_fetch: Mutex<Option<String>>,
    fail_next_head: Mutex<Option<String>>,
}

impl MockLogSource {
    /// Creates an empty MockLogSource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the head position reported by the source.
    pub fn set_head(&self, position: u64) {
        self.head.store(position, Ordering::SeqCst);
    }

    /// Adds a log to the source's stream.
    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    /// Makes the next `fetch_logs` call fail with `message`.
    pub fn fail_next_fetch(&self, message: &str) {
        *self.fail_next_fetch.lock().unwrap() = Some(message.to_string());
    }

    /// Makes the next `head_position` call fail with `message`.
    pub fn fail_next_head(&self, message: &str) {
        *self.fail_next_head.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn fetch_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, LogSourceError> {
        if let Some(message) = self.fail_next_fetch.lock().unwrap().take() {
            return Err(LogSourceError::Transport(message));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.address == address && log.position >= from && log.position <= to)
            .cloned()
            .collect())
    }

    async fn head_position(&self) -> Result<u64, LogSourceError> {
        if let Some(message) = self.fail_next_head.lock().unwrap().take() {
            return Err(LogSourceError::Transport(message));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }
}

/// A [`FanoutSink`] recording every dispatched event.
#[derive(Default)]
pub struct RecordingFanout {
    events: Mutex<Vec<StoredEvent>>,
}

impl RecordingFanout {
    /// Creates an empty RecordingFanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatched events in dispatch order.
    pub fn dispatched(&self) -> Vec<StoredEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl FanoutSink for RecordingFanout {
    fn dispatch(&self, event: &StoredEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
