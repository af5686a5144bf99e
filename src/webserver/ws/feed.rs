//! Change feeds
//!
//! A change feed delivers raw notification payloads published on a topic.
//! Production uses Postgres `LISTEN/NOTIFY` (see [`super::postgres`]); the
//! in-memory feed backs tests and database-less runs.
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::errors::{HubError, HubResult};

#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    /// Open a dedicated subscription to `topic`
    async fn subscribe(&self, topic: &str) -> HubResult<Box<dyn ChangeSubscription>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ChangeSubscription: Send {
    /// Wait for the next payload; an error means the subscription is gone
    async fn next_payload(&mut self) -> HubResult<String>;
}

// ============================================================================
// MEMORY FEED
// ============================================================================

#[derive(Default)]
pub struct MemoryFeed {
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<String>>>>,
    unavailable: AtomicBool,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every subscriber of `topic`; returns how many got it
    pub fn publish(&self, topic: &str, payload: impl Into<String>) -> usize {
        let payload = payload.into();
        let mut topics = self.topics.lock();
        let Some(subscribers) = topics.get_mut(topic) else {
            return 0;
        };
        subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
        subscribers.len()
    }

    /// End every subscription to `topic`
    pub fn close_topic(&self, topic: &str) {
        self.topics.lock().remove(topic);
    }

    pub fn subscribers(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Make new subscriptions fail, like an unreachable database
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChangeFeed for MemoryFeed {
    async fn subscribe(&self, topic: &str) -> HubResult<Box<dyn ChangeSubscription>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HubError::Subscription(format!(
                "memory feed unavailable for '{}'",
                topic
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(tx);

        Ok(Box::new(MemorySubscription {
            topic: topic.to_string(),
            rx,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemorySubscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl ChangeSubscription for MemorySubscription {
    async fn next_payload(&mut self) -> HubResult<String> {
        self.rx.recv().await.ok_or_else(|| HubError::SubscriptionClosed {
            topic: self.topic.clone(),
        })
    }
}
