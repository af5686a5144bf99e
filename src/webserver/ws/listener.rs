/// Change-event listener
///
/// Holds one subscription to the change feed and relays raw payloads to the
/// hub's decode loop. Forwarding never waits: a full relay drops the event.
/// A failed subscription ends the listener without retry; clients stay
/// connected but stop receiving updates.
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::logger::{self, LogTag};

use super::{feed::ChangeFeed, metrics::HubMetrics, tasks::signalled};

pub struct ChangeEventListener {
    feed: Arc<dyn ChangeFeed>,
    topic: String,
    relay: mpsc::Sender<String>,
    metrics: Arc<HubMetrics>,
}

impl ChangeEventListener {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        topic: impl Into<String>,
        relay: mpsc::Sender<String>,
        metrics: Arc<HubMetrics>,
    ) -> Self {
        Self {
            feed,
            topic: topic.into(),
            relay,
            metrics,
        }
    }

    /// Run until `shutdown` turns true or the subscription fails
    pub async fn listen(self, mut shutdown: watch::Receiver<bool>) {
        let subscribed = tokio::select! {
            _ = signalled(&mut shutdown) => return,
            result = self.feed.subscribe(&self.topic) => result,
        };

        let mut subscription = match subscribed {
            Ok(subscription) => subscription,
            Err(e) => {
                logger::error(
                    LogTag::Listener,
                    &format!(
                        "❌ Failed to subscribe to '{}' on {} feed: {}",
                        self.topic,
                        self.feed.name(),
                        e
                    ),
                );
                return;
            }
        };

        logger::info(
            LogTag::Listener,
            &format!("👂 Listening for changes on '{}' ({})", self.topic, self.feed.name()),
        );

        loop {
            tokio::select! {
                _ = signalled(&mut shutdown) => break,
                next = subscription.next_payload() => match next {
                    Ok(payload) => self.forward(payload),
                    Err(e) => {
                        logger::error(
                            LogTag::Listener,
                            &format!("❌ Change subscription lost, live updates stopped: {}", e),
                        );
                        return;
                    }
                },
            }
        }

        logger::debug(LogTag::Listener, "Listener stopped");
    }

    fn forward(&self, payload: String) {
        self.metrics.notification_received();
        match self.relay.try_send(payload) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.relay_dropped();
                logger::warning(LogTag::Listener, "Relay full, dropping change event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.relay_dropped();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::feed::MemoryFeed;
    use crate::webserver::ws::testing::wait_until;
    use std::time::Duration;

    const TOPIC: &str = "websocket_events";

    #[tokio::test]
    async fn test_forwards_payloads_in_order() {
        let feed = Arc::new(MemoryFeed::new());
        let metrics = HubMetrics::new();
        let (relay_tx, mut relay_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = ChangeEventListener::new(feed.clone(), TOPIC, relay_tx, metrics.clone());
        let task = tokio::spawn(listener.listen(shutdown_rx));
        assert!(wait_until(Duration::from_secs(1), || feed.subscribers(TOPIC) == 1).await);

        feed.publish(TOPIC, "first");
        feed.publish(TOPIC, "second");
        assert_eq!(relay_rx.recv().await.as_deref(), Some("first"));
        assert_eq!(relay_rx.recv().await.as_deref(), Some("second"));

        shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listener should stop on shutdown")
            .unwrap();
        assert_eq!(metrics.snapshot().notifications_received, 2);
    }

    #[tokio::test]
    async fn test_full_relay_drops_events() {
        let feed = Arc::new(MemoryFeed::new());
        let metrics = HubMetrics::new();
        let (relay_tx, mut relay_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = ChangeEventListener::new(feed.clone(), TOPIC, relay_tx, metrics.clone());
        tokio::spawn(listener.listen(shutdown_rx));
        assert!(wait_until(Duration::from_secs(1), || feed.subscribers(TOPIC) == 1).await);

        for payload in ["a", "b", "c"] {
            feed.publish(TOPIC, payload);
        }
        assert!(
            wait_until(Duration::from_secs(1), || metrics.snapshot().relay_dropped == 2).await
        );
        assert_eq!(relay_rx.recv().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_subscription_failure_ends_listener() {
        let feed = Arc::new(MemoryFeed::new());
        feed.set_unavailable(true);
        let (relay_tx, _relay_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = ChangeEventListener::new(feed, TOPIC, relay_tx, HubMetrics::new());
        tokio::time::timeout(Duration::from_secs(1), listener.listen(shutdown_rx))
            .await
            .expect("listener should exit without retrying");
    }

    #[tokio::test]
    async fn test_lost_subscription_ends_listener() {
        let feed = Arc::new(MemoryFeed::new());
        let (relay_tx, _relay_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = ChangeEventListener::new(feed.clone(), TOPIC, relay_tx, HubMetrics::new());
        let task = tokio::spawn(listener.listen(shutdown_rx));
        assert!(wait_until(Duration::from_secs(1), || feed.subscribers(TOPIC) == 1).await);

        feed.close_topic(TOPIC);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listener should exit")
            .unwrap();
    }
}
