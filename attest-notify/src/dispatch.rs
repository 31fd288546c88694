//! Fan-out front door handed to the synchronizer.

use std::sync::Arc;

use tracing::warn;

use attest_state::{store::StoredEvent, sync::FanoutSink};

use crate::{email::EmailNotifier, inapp::InAppNotifier, webhook::WebhookDispatcher};

/// Fans one applied event out to webhooks, email and in-app notifications.
///
/// The three channels run as independent best-effort deliveries; a failure
/// in one never suppresses the others, and dispatch itself is detached
/// from the indexing critical path.
pub struct Fanout {
    webhook: Arc<WebhookDispatcher>,
    inapp: Arc<InAppNotifier>,
    email: Arc<EmailNotifier>,
}

impl Fanout {
    /// Creates a new Fanout over the three delivery channels.
    pub fn new(webhook: WebhookDispatcher, inapp: InAppNotifier, email: EmailNotifier) -> Self {
        Fanout {
            webhook: Arc::new(webhook),
            inapp: Arc::new(inapp),
            email: Arc::new(email),
        }
    }

    /// Runs all three channels for `event` to completion.
    pub async fn deliver_all(&self, event: &StoredEvent) {
        let (webhook, inapp, email) = tokio::join!(
            self.webhook.deliver(event),
            self.inapp.notify(event),
            self.email.notify(event),
        );
        if let Err(error) = webhook {
            warn!(event = %event.event_name, "Webhook fan-out failed: {}", error);
        }
        if let Err(error) = inapp {
            warn!(event = %event.event_name, "In-app notification failed: {}", error);
        }
        if let Err(error) = email {
            warn!(event = %event.event_name, "Email dispatch failed: {}", error);
        }
    }
}

impl FanoutSink for Fanout {
    fn dispatch(&self, event: &StoredEvent) {
        let webhook = self.webhook.clone();
        let inapp = self.inapp.clone();
        let email = self.email.clone();
        let event = event.clone();
        tokio::spawn(async move {
            let fanout = Fanout {
                webhook,
                inapp,
                email,
            };
            fanout.deliver_all(&event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        email::EmailConfig,
        webhook::{WebhookConfig, WebhookDispatcher},
    };
    use attest_state::store::WebhookSubscription;
    use attest_testutils::{
        stored_event, MemoryNotificationStore, MemoryProjectionStore, MemorySubscriptionStore,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    const ENDORSEE: &str = "0xaaaa000000000000000000000000000000000001";

    /// A webhook endpoint that always fails must not suppress in-app
    /// notification creation for the same event.
    #[tokio::test]
    async fn failing_webhook_does_not_suppress_inapp_notification() {
        let dead_addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let subscriptions = Arc::new(MemorySubscriptionStore::new());
        subscriptions.add_subscription(WebhookSubscription {
            id: 1,
            url: format!("http://{}/hook", dead_addr),
            events: vec!["endorsement.created".to_string()],
            secret: None,
            is_active: true,
        });
        let notifications = Arc::new(MemoryNotificationStore::new());
        let projections = Arc::new(MemoryProjectionStore::new());

        let fanout = Fanout::new(
            WebhookDispatcher::new(subscriptions.clone(), WebhookConfig::new(Some(1), Some(10)))
                .unwrap(),
            InAppNotifier::new(notifications.clone(), projections.clone()),
            EmailNotifier::new(EmailConfig::default(), projections).unwrap(),
        );

        let event = stored_event(
            "endorsement.created",
            json!({"endorsement_id": 9, "endorsee": ENDORSEE, "endorser": "0xbb"}),
        );
        fanout.deliver_all(&event).await;

        // The failed webhook attempt is on the audit trail..
        let deliveries = subscriptions.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!(!deliveries[0].success);
        // ..and the endorsee still got their in-app notification.
        let created = notifications.notifications();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient_id, ENDORSEE);
    }
}
