/// Connection registry
///
/// Maps a user id to that user's live connections. A key exists only while
/// its connection list is non-empty. Fan-out resolves targets under the read
/// lock and hands writes to the dispatcher without touching a socket.
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logger::{self, LogTag};

use super::{
    connection::Connection,
    dispatcher::{Enqueue, WriteDispatcher},
    metrics::HubMetrics,
    notification::{Audience, Notification},
};

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Connections the notification resolved to
    pub targeted: usize,
    pub enqueued: usize,
    pub dropped: usize,
}

pub struct ConnectionRegistry {
    connections: RwLock<HashMap<i64, Vec<Arc<Connection>>>>,
    dispatcher: WriteDispatcher,
    closed: AtomicBool,
    metrics: Arc<HubMetrics>,
}

impl ConnectionRegistry {
    pub fn new(workers: usize, queue_capacity: usize, metrics: Arc<HubMetrics>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            dispatcher: WriteDispatcher::new(workers, queue_capacity, Arc::clone(&metrics)),
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Start the write workers
    pub fn start(&self) {
        self.dispatcher.start();
    }

    pub fn dispatcher(&self) -> &WriteDispatcher {
        &self.dispatcher
    }

    /// Register a connection; refused once the registry is closed
    pub fn add(&self, connection: &Arc<Connection>) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        self.connections
            .write()
            .entry(connection.user_id())
            .or_default()
            .push(Arc::clone(connection));
        self.metrics.connection_opened();

        logger::debug(
            LogTag::Registry,
            &format!(
                "Added connection {} for user {}",
                connection.id(),
                connection.user_id()
            ),
        );
        true
    }

    /// Unregister a connection; no-op if it is not registered
    pub fn remove(&self, connection: &Arc<Connection>) -> bool {
        let removed = {
            let mut connections = self.connections.write();
            let user_id = connection.user_id();
            let Some(list) = connections.get_mut(&user_id) else {
                return false;
            };

            let position = list.iter().position(|c| Arc::ptr_eq(c, connection));
            if let Some(index) = position {
                list.remove(index);
            }
            if list.is_empty() {
                connections.remove(&user_id);
            }
            position.is_some()
        };

        if removed {
            self.metrics.connection_closed();
            logger::debug(
                LogTag::Registry,
                &format!("Removed connection {}", connection.id()),
            );
        }
        removed
    }

    /// Resolve the audience and enqueue one write per target connection
    ///
    /// Never waits on I/O. Users without a live connection are skipped.
    pub fn send_notification(&self, notification: &Notification) -> FanoutReport {
        let mut report = FanoutReport::default();
        if self.closed.load(Ordering::SeqCst) {
            return report;
        }

        let payload = notification.payload();
        let connections = self.connections.read();
        let mut deliver = |connection: &Arc<Connection>| {
            report.targeted += 1;
            match connection.send(&self.dispatcher, Arc::clone(&payload)) {
                Enqueue::Queued => report.enqueued += 1,
                Enqueue::Full | Enqueue::Closed => report.dropped += 1,
            }
        };

        match notification.audience() {
            Audience::Everyone => connections.values().flatten().for_each(&mut deliver),
            Audience::Users(user_ids) => user_ids
                .iter()
                .filter_map(|user_id| connections.get(user_id))
                .flatten()
                .for_each(&mut deliver),
        }
        drop(connections);

        if report.dropped > 0 {
            logger::warning(
                LogTag::Registry,
                &format!(
                    "Fan-out dropped {} of {} writes",
                    report.dropped, report.targeted
                ),
            );
        }
        report
    }

    /// Stop accepting work and drain the dispatcher; idempotent
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let remaining = self.connection_count();
            if remaining > 0 {
                logger::warning(
                    LogTag::Registry,
                    &format!("Closing with {} connections still registered", remaining),
                );
            }
        }
        self.dispatcher.close().await;
    }

    pub fn user_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().values().map(Vec::len).sum()
    }

    #[cfg(test)]
    fn connections_for(&self, user_id: i64) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn has_empty_entries(&self) -> bool {
        self.connections.read().values().any(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::connection::ConnectionSettings;
    use crate::webserver::ws::testing::{mock_transport, MockOptions, MockPeer};
    use std::time::Duration;

    fn connection(user_id: i64) -> (Arc<Connection>, MockPeer) {
        let (sink, _stream, peer) = mock_transport(MockOptions::default());
        let settings = ConnectionSettings {
            write_timeout: Duration::from_millis(200),
            close_grace: Duration::from_millis(100),
        };
        (Connection::new(user_id, sink, settings), peer)
    }

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(5, 64, HubMetrics::new())
    }

    #[tokio::test]
    async fn test_key_exists_iff_non_empty() {
        let registry = registry();
        let (a1, _p1) = connection(1);
        let (a2, _p2) = connection(1);
        let (b1, _p3) = connection(2);

        registry.add(&a1);
        registry.add(&b1);
        registry.add(&a2);
        assert_eq!(registry.user_count(), 2);
        assert_eq!(registry.connection_count(), 3);

        assert!(registry.remove(&a1));
        assert_eq!(registry.user_count(), 2);
        assert!(!registry.remove(&a1));

        assert!(registry.remove(&a2));
        assert_eq!(registry.user_count(), 1);
        assert!(registry.connections_for(1).is_empty());

        assert!(registry.remove(&b1));
        assert!(!registry.remove(&b1));
        assert_eq!(registry.user_count(), 0);
        assert!(!registry.has_empty_entries());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_remove_keeps_invariant() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..8)
            .map(|task| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for round in 0..50 {
                        let user_id = ((task + round) % 3) as i64;
                        let (first, _p1) = connection(user_id);
                        let (second, _p2) = connection(user_id);
                        assert!(registry.add(&first));
                        tokio::task::yield_now().await;
                        assert!(registry.add(&second));
                        assert!(registry.remove(&first));
                        tokio::task::yield_now().await;
                        assert!(registry.remove(&second));
                        assert!(!registry.remove(&second));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!registry.has_empty_entries());
        assert_eq!(registry.user_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_enqueues_one_item_per_connection() {
        let registry = registry();
        let mut keep = Vec::new();
        for user_id in [1, 1, 2, 3, 3, 3] {
            let (conn, peer) = connection(user_id);
            registry.add(&conn);
            keep.push(peer);
        }

        let notification =
            Notification::parse(r#"{"message":{"k":1},"broadcast":true,"user_ids":[1]}"#).unwrap();
        let report = registry.send_notification(&notification);

        assert_eq!(
            report,
            FanoutReport {
                targeted: 6,
                enqueued: 6,
                dropped: 0
            }
        );
        assert_eq!(registry.dispatcher().queued(), 6);
    }

    #[tokio::test]
    async fn test_targeted_reaches_only_listed_users() {
        let registry = registry();
        let (a, mut peer_a) = connection(10);
        let (b, mut peer_b) = connection(20);
        let (c, mut peer_c) = connection(30);
        for conn in [&a, &b, &c] {
            registry.add(conn);
        }
        registry.start();

        let notification =
            Notification::parse(r#"{"message":"vault changed","user_ids":[10,30,99]}"#).unwrap();
        let report = registry.send_notification(&notification);
        assert_eq!(report.enqueued, 2);

        assert_eq!(peer_a.next_text().await.as_deref(), Some(r#""vault changed""#));
        assert_eq!(peer_c.next_text().await.as_deref(), Some(r#""vault changed""#));
        assert_eq!(peer_b.text_within(Duration::from_millis(200)).await, None);

        registry.close().await;
    }

    #[tokio::test]
    async fn test_closed_registry_refuses_work() {
        let registry = registry();
        let (conn, _peer) = connection(1);
        registry.add(&conn);
        registry.close().await;
        registry.close().await;

        let notification = Notification::parse(r#"{"message":1,"broadcast":true}"#).unwrap();
        assert_eq!(registry.send_notification(&notification).enqueued, 0);

        let (late, _late_peer) = connection(2);
        assert!(!registry.add(&late));
        assert!(registry.dispatcher().is_closed());
    }
}
