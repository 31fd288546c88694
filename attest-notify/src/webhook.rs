//! Webhook delivery with bounded retry and a per-attempt audit trail.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use attest_state::{
    metrics,
    store::{StoredEvent, SubscriptionStore, WebhookDelivery, WebhookSubscription},
};

use crate::error::DeliveryError;

/// Signature header attached to signed deliveries.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Holds config data for the [`WebhookDispatcher`].
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Maximum delivery attempts per subscription per event.
    pub max_attempts: u32,
    /// Base retry delay; attempt `n` waits `n` times this long.
    pub retry_delay: std::time::Duration,
}

impl WebhookConfig {
    /// Returns a new instance of [`WebhookConfig`].
    pub fn new(max_attempts: Option<u32>, retry_delay_ms: Option<u64>) -> Self {
        WebhookConfig {
            max_attempts: max_attempts.unwrap_or(3).max(1),
            retry_delay: std::time::Duration::from_millis(retry_delay_ms.unwrap_or(500)),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Delivers event envelopes to matching webhook subscriptions.
///
/// The delivery log is an audit trail, not a queue: rows are appended for
/// every attempt and never dequeued or mutated.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    subscriptions: Arc<dyn SubscriptionStore>,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    /// Creates a new WebhookDispatcher.
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        config: WebhookConfig,
    ) -> Result<Self, DeliveryError> {
        Ok(WebhookDispatcher {
            client: reqwest::Client::builder().build()?,
            subscriptions,
            config,
        })
    }

    /// Builds the delivery envelope for an event.
    pub fn envelope(event: &StoredEvent) -> serde_json::Value {
        serde_json::json!({
            "event": event.event_name,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "data": event.payload,
        })
    }

    /// Returns the hex HMAC-SHA256 of `body` under `secret`.
    pub fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Delivers `event` to every active subscription whose filter set
    /// includes its type. Per-subscription failures are contained.
    pub async fn deliver(&self, event: &StoredEvent) -> Result<(), DeliveryError> {
        let subscriptions = self
            .subscriptions
            .active_subscriptions_for(&event.event_name)
            .await?;
        if subscriptions.is_empty() {
            debug!(event = %event.event_name, "No webhook subscriptions match");
            return Ok(());
        }
        let envelope = Self::envelope(event);
        let body = serde_json::to_vec(&envelope)?;
        for subscription in subscriptions {
            self.deliver_to(&subscription, event, &envelope, &body).await;
        }
        Ok(())
    }

    /// Runs the bounded retry loop for one subscription, appending every
    /// attempt to the delivery log.
    async fn deliver_to(
        &self,
        subscription: &WebhookSubscription,
        event: &StoredEvent,
        envelope: &serde_json::Value,
        body: &[u8],
    ) {
        for attempt in 1..=self.config.max_attempts {
            let outcome = self.post_once(subscription, body).await;
            let (success, status_code, error_message) = match &outcome {
                Ok(status) => (true, Some(*status as i32), None),
                Err(DeliveryError::Endpoint(status)) => {
                    (false, Some(*status as i32), Some(format!("HTTP {}", status)))
                }
                Err(error) => (false, None, Some(error.to_string())),
            };
            let delivery = WebhookDelivery {
                subscription_id: subscription.id,
                event_name: event.event_name.clone(),
                payload: envelope.clone(),
                success,
                status_code,
                error_message,
            };
            if let Err(error) = self.subscriptions.append_delivery(&delivery).await {
                warn!(
                    subscription = subscription.id,
                    "Failed to append webhook delivery log: {}", error
                );
            }
            match outcome {
                Ok(_) => {
                    metrics::record_webhook_delivery("success");
                    return;
                }
                Err(error) => {
                    metrics::record_webhook_delivery("failure");
                    if attempt == self.config.max_attempts {
                        warn!(
                            subscription = subscription.id,
                            url = %subscription.url,
                            event = %event.event_name,
                            "Webhook delivery failed permanently after {} attempts: {}",
                            attempt,
                            error
                        );
                    } else {
                        tokio::time::sleep(self.config.retry_delay * attempt).await;
                    }
                }
            }
        }
    }

    /// POSTs the envelope once, returning the accepted status code.
    async fn post_once(
        &self,
        subscription: &WebhookSubscription,
        body: &[u8],
    ) -> Result<u16, DeliveryError> {
        let mut request = self
            .client
            .post(&subscription.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(secret) = &subscription.secret {
            request = request.header(SIGNATURE_HEADER, Self::sign(secret, body));
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DeliveryError::Endpoint(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_testutils::{stored_event, MemorySubscriptionStore};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn subscription(id: i64, url: &str, secret: Option<&str>) -> WebhookSubscription {
        WebhookSubscription {
            id,
            url: url.to_string(),
            events: vec!["endorsement.created".to_string()],
            secret: secret.map(str::to_string),
            is_active: true,
        }
    }

    fn fast_config(max_attempts: u32) -> WebhookConfig {
        WebhookConfig::new(Some(max_attempts), Some(10))
    }

    /// Serves `responses` HTTP requests with the given status line, then
    /// exits.
    async fn spawn_endpoint(
        status_line: &'static str,
        responses: usize,
    ) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            for _ in 0..responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buffer = vec![0u8; 65536];
                let mut read_total = 0;
                loop {
                    let n = stream.read(&mut buffer[read_total..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read_total += n;
                    let received = &buffer[..read_total];
                    if let Some(header_end) = received
                        .windows(4)
                        .position(|window| window == b"\r\n\r\n")
                    {
                        let headers = String::from_utf8_lossy(&received[..header_end]);
                        let content_length = headers
                            .lines()
                            .find_map(|line| {
                                line.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|value| value.trim().parse::<usize>().unwrap())
                            })
                            .unwrap_or(0);
                        if read_total >= header_end + 4 + content_length {
                            break;
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status_line
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.flush().await.unwrap();
            }
        });
        (addr, handle)
    }

    #[test]
    fn signature_matches_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        assert_eq!(
            WebhookDispatcher::sign("key", b"The quick brown fox jumps over the lazy dog"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn envelope_carries_event_name_and_payload() {
        let event = stored_event("endorsement.created", json!({"endorsement_id": 9}));
        let envelope = WebhookDispatcher::envelope(&event);
        assert_eq!(envelope["event"], "endorsement.created");
        assert_eq!(envelope["data"]["endorsement_id"], 9);
        assert!(envelope["timestamp"].is_string());
    }

    #[test]
    fn subscription_filter_matches_exact_event_names() {
        let subscription = subscription(1, "http://localhost/hook", None);
        assert!(subscription.matches("endorsement.created"));
        assert!(!subscription.matches("profile.created"));
    }

    #[tokio::test]
    async fn successful_delivery_appends_one_log_row() {
        let (addr, server) = spawn_endpoint("200 OK", 1).await;
        let store = Arc::new(MemorySubscriptionStore::new());
        store.add_subscription(subscription(1, &format!("http://{}/hook", addr), Some("s3cret")));
        let dispatcher = WebhookDispatcher::new(store.clone(), fast_config(3)).unwrap();

        let event = stored_event("endorsement.created", json!({"endorsement_id": 9}));
        dispatcher.deliver(&event).await.unwrap();
        server.await.unwrap();

        let deliveries = store.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].success);
        assert_eq!(deliveries[0].status_code, Some(200));
        assert_eq!(deliveries[0].event_name, "endorsement.created");
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_the_retry_budget() {
        // Bind then drop to get a port nothing listens on.
        let dead_addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let store = Arc::new(MemorySubscriptionStore::new());
        store.add_subscription(subscription(1, &format!("http://{}/hook", dead_addr), None));
        let dispatcher = WebhookDispatcher::new(store.clone(), fast_config(2)).unwrap();

        let event = stored_event("endorsement.created", json!({"endorsement_id": 9}));
        dispatcher.deliver(&event).await.unwrap();

        let deliveries = store.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|delivery| !delivery.success));
        assert!(deliveries.iter().all(|delivery| delivery.error_message.is_some()));
    }

    #[tokio::test]
    async fn rejecting_endpoint_records_status_codes() {
        let (addr, server) = spawn_endpoint("500 Internal Server Error", 2).await;
        let store = Arc::new(MemorySubscriptionStore::new());
        store.add_subscription(subscription(1, &format!("http://{}/hook", addr), None));
        let dispatcher = WebhookDispatcher::new(store.clone(), fast_config(2)).unwrap();

        let event = stored_event("endorsement.created", json!({"endorsement_id": 9}));
        dispatcher.deliver(&event).await.unwrap();
        server.await.unwrap();

        let deliveries = store.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries
            .iter()
            .all(|delivery| delivery.status_code == Some(500) && !delivery.success));
    }

    #[tokio::test]
    async fn events_without_matching_subscription_are_not_delivered() {
        let store = Arc::new(MemorySubscriptionStore::new());
        store.add_subscription(subscription(1, "http://localhost/hook", None));
        let dispatcher = WebhookDispatcher::new(store.clone(), fast_config(1)).unwrap();

        let event = stored_event("profile.created", json!({}));
        dispatcher.deliver(&event).await.unwrap();
        assert!(store.deliveries().is_empty());
    }
}
