//! In-app notification creation.

use std::sync::Arc;

use tracing::debug;

use attest_state::store::{NewNotification, NotificationStore, ProjectionStore, StoredEvent};

use crate::error::DeliveryError;

/// Builds the in-app notification an event should produce, if any.
///
/// Recipients are resolved from the event payload or, for events that only
/// carry entity ids, from the projected state. Events that notify nobody
/// return `None`.
pub async fn notification_for(
    event: &StoredEvent,
    projections: &dyn ProjectionStore,
) -> Result<Option<NewNotification>, DeliveryError> {
    let notification = match event.event_name.as_str() {
        "endorsement.created" => {
            let Some(endorsee) = event.payload.get("endorsee").and_then(|value| value.as_str())
            else {
                return Ok(None);
            };
            let endorser = event
                .payload
                .get("endorser")
                .and_then(|value| value.as_str())
                .unwrap_or("someone");
            Some(NewNotification {
                recipient_id: endorsee.to_string(),
                kind: event.event_name.clone(),
                title: "New endorsement".to_string(),
                message: format!("Your skill was endorsed by {}.", endorser),
                data: event.payload.clone(),
            })
        }
        "skill.verified" => {
            let Some(skill_id) = event.payload.get("skill_id").and_then(|value| value.as_i64())
            else {
                return Ok(None);
            };
            match projections.get_skill(skill_id).await? {
                Some(skill) => Some(NewNotification {
                    recipient_id: skill.wallet_address,
                    kind: event.event_name.clone(),
                    title: "Skill verified".to_string(),
                    message: format!("Your \"{}\" skill claim was verified.", skill.name),
                    data: event.payload.clone(),
                }),
                None => None,
            }
        }
        "bounty.claimed" => {
            let Some(pool_id) = event.payload.get("pool_id").and_then(|value| value.as_i64())
            else {
                return Ok(None);
            };
            match projections.get_bounty_pool(pool_id).await? {
                Some(pool) => Some(NewNotification {
                    recipient_id: pool.funder,
                    kind: event.event_name.clone(),
                    title: "Bounty claimed".to_string(),
                    message: format!(
                        "A claim was filed against your \"{}\" bounty pool.",
                        pool.skill_name
                    ),
                    data: event.payload.clone(),
                }),
                None => None,
            }
        }
        _ => None,
    };
    Ok(notification)
}

/// Creates in-app notification rows for applied events.
pub struct InAppNotifier {
    notifications: Arc<dyn NotificationStore>,
    projections: Arc<dyn ProjectionStore>,
}

impl InAppNotifier {
    /// Creates a new InAppNotifier.
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        projections: Arc<dyn ProjectionStore>,
    ) -> Self {
        InAppNotifier {
            notifications,
            projections,
        }
    }

    /// Creates the notification for `event`, if it produces one. Returns
    /// whether a notification was created.
    pub async fn notify(&self, event: &StoredEvent) -> Result<bool, DeliveryError> {
        match notification_for(event, self.projections.as_ref()).await? {
            Some(notification) => {
                self.notifications.create(&notification).await?;
                Ok(true)
            }
            None => {
                debug!(event = %event.event_name, "Event produces no in-app notification");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_state::store::Skill;
    use attest_testutils::{stored_event, MemoryNotificationStore, MemoryProjectionStore};
    use serde_json::json;

    const ENDORSEE: &str = "0xaaaa000000000000000000000000000000000001";

    #[tokio::test]
    async fn endorsement_notifies_the_endorsee() {
        let notifications = Arc::new(MemoryNotificationStore::new());
        let projections = Arc::new(MemoryProjectionStore::new());
        let notifier = InAppNotifier::new(notifications.clone(), projections);

        let event = stored_event(
            "endorsement.created",
            json!({"endorsement_id": 9, "endorsee": ENDORSEE, "endorser": "0xbb"}),
        );
        assert!(notifier.notify(&event).await.unwrap());

        let created = notifications.notifications();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient_id, ENDORSEE);
        assert_eq!(created[0].kind, "endorsement.created");
    }

    #[tokio::test]
    async fn skill_verified_notifies_the_skill_owner() {
        let notifications = Arc::new(MemoryNotificationStore::new());
        let projections = Arc::new(MemoryProjectionStore::new());
        projections
            .insert_skill(&Skill {
                skill_id: 7,
                wallet_address: ENDORSEE.to_string(),
                name: "rust".to_string(),
                evidence_uri: None,
                verified: true,
            })
            .await
            .unwrap();
        let notifier = InAppNotifier::new(notifications.clone(), projections);

        let event = stored_event("skill.verified", json!({"skill_id": 7}));
        assert!(notifier.notify(&event).await.unwrap());
        assert_eq!(notifications.notifications()[0].recipient_id, ENDORSEE);
    }

    #[tokio::test]
    async fn skill_verified_without_projected_skill_notifies_nobody() {
        let notifications = Arc::new(MemoryNotificationStore::new());
        let projections = Arc::new(MemoryProjectionStore::new());
        let notifier = InAppNotifier::new(notifications.clone(), projections);

        let event = stored_event("skill.verified", json!({"skill_id": 7}));
        assert!(!notifier.notify(&event).await.unwrap());
        assert!(notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn uncovered_events_notify_nobody() {
        let notifications = Arc::new(MemoryNotificationStore::new());
        let projections = Arc::new(MemoryProjectionStore::new());
        let notifier = InAppNotifier::new(notifications.clone(), projections);

        let event = stored_event("profile.created", json!({"wallet": ENDORSEE}));
        assert!(!notifier.notify(&event).await.unwrap());
    }
}
