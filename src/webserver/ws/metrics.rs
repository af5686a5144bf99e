/// Hub metrics collection
///
/// Lifetime counters for connections, change events and writes. Served as a
/// snapshot by the stats route.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// HUB METRICS
// ============================================================================

/// Hub-level metrics (thread-safe)
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Connections registered (lifetime)
    connections_opened: AtomicU64,

    /// Connections unregistered (lifetime)
    connections_closed: AtomicU64,

    /// Connections currently registered
    active_connections: AtomicUsize,

    /// Raw change events received from the feed
    notifications_received: AtomicU64,

    /// Change events that failed to decode
    notifications_malformed: AtomicU64,

    /// Change events dropped because the relay was full
    relay_dropped: AtomicU64,

    /// Writes handed to the dispatcher
    writes_enqueued: AtomicU64,

    /// Writes dropped because the queue was full or closed
    writes_dropped: AtomicU64,

    /// Writes completed on the socket
    writes_sent: AtomicU64,

    /// Writes that failed or timed out
    writes_failed: AtomicU64,

    /// Writes skipped because the target was already closed
    writes_discarded: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn notification_received(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_malformed(&self) {
        self.notifications_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relay_dropped(&self) {
        self.relay_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_enqueued(&self) {
        self.writes_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_dropped(&self) {
        self.writes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_sent(&self) {
        self.writes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_discarded(&self) {
        self.writes_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot for API
    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            notifications_malformed: self.notifications_malformed.load(Ordering::Relaxed),
            relay_dropped: self.relay_dropped.load(Ordering::Relaxed),
            writes_enqueued: self.writes_enqueued.load(Ordering::Relaxed),
            writes_dropped: self.writes_dropped.load(Ordering::Relaxed),
            writes_sent: self.writes_sent.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            writes_discarded: self.writes_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Hub metrics snapshot (serializable)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub active_connections: usize,
    pub notifications_received: u64,
    pub notifications_malformed: u64,
    pub relay_dropped: u64,
    pub writes_enqueued: u64,
    pub writes_dropped: u64,
    pub writes_sent: u64,
    pub writes_failed: u64,
    pub writes_discarded: u64,
}
