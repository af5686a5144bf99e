/// Live-update hub - composition root
///
/// The Hub owns every moving part of the live-update channel:
/// - The connection registry and its write dispatcher
/// - The change-event listener and the relay it feeds
/// - The decode loop turning change events into fan-outs
/// - One supervisor per accepted connection
///
/// Lifecycle is one-directional: Created → Running → Closing → Closed.
/// `close()` joins every task the hub spawned before returning. Connections
/// stay open until the write queue has drained, so queued writes still reach
/// their clients.
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::config::HubConfig;
use crate::errors::{HubError, HubResult};
use crate::logger::{self, LogTag};

use super::{
    connection::{Connection, ConnectionSettings},
    feed::ChangeFeed,
    listener::ChangeEventListener,
    metrics::{HubMetrics, HubMetricsSnapshot},
    notification::Notification,
    registry::{ConnectionRegistry, FanoutReport},
    tasks::{signalled, TaskCounter},
    transport::{FrameSink, FrameStream},
};

// ============================================================================
// HUB SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSettings {
    pub timeout: Duration,
    pub write_timeout: Duration,
    pub close_grace: Duration,
    pub write_workers: usize,
    pub write_queue_capacity: usize,
    pub relay_capacity: usize,
    pub topic: String,
}

impl From<&HubConfig> for HubSettings {
    fn from(config: &HubConfig) -> Self {
        Self {
            timeout: config.timeout(),
            write_timeout: config.write_timeout(),
            close_grace: config.close_grace(),
            write_workers: config.write_workers,
            write_queue_capacity: config.write_queue_capacity,
            relay_capacity: config.relay_capacity,
            topic: config.topic.clone(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from(&HubConfig::default())
    }
}

impl HubSettings {
    fn connection(&self) -> ConnectionSettings {
        ConnectionSettings {
            write_timeout: self.write_timeout,
            close_grace: self.close_grace,
        }
    }
}

// ============================================================================
// HUB STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum HubState {
    Created = 0,
    Running = 1,
    Closing = 2,
    Closed = 3,
}

impl HubState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HubState::Created,
            1 => HubState::Running,
            2 => HubState::Closing,
            _ => HubState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HubState::Created => "created",
            HubState::Running => "running",
            HubState::Closing => "closing",
            HubState::Closed => "closed",
        }
    }
}

/// Point-in-time view served by the stats route
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub state: HubState,
    pub users: usize,
    pub connections: usize,
    pub queued_writes: usize,
    pub active_tasks: usize,
    pub metrics: HubMetricsSnapshot,
}

// ============================================================================
// HUB
// ============================================================================

pub struct Hub {
    settings: HubSettings,
    registry: ConnectionRegistry,
    feed: Arc<dyn ChangeFeed>,
    relay_tx: mpsc::Sender<String>,
    relay_rx: Mutex<Option<mpsc::Receiver<String>>>,
    /// Stops the listener and the decode loop
    shutdown: watch::Sender<bool>,
    /// Tells connection supervisors to close; raised after the drain
    disconnect: watch::Sender<bool>,
    closed: watch::Sender<bool>,
    state: AtomicU8,
    /// Listener and decode loop
    feed_tasks: Arc<TaskCounter>,
    /// Connection supervisors
    tasks: Arc<TaskCounter>,
    metrics: Arc<HubMetrics>,
}

impl Hub {
    pub fn new(settings: HubSettings, feed: Arc<dyn ChangeFeed>) -> Arc<Self> {
        let metrics = HubMetrics::new();
        let registry = ConnectionRegistry::new(
            settings.write_workers,
            settings.write_queue_capacity,
            Arc::clone(&metrics),
        );
        let (relay_tx, relay_rx) = mpsc::channel(settings.relay_capacity.max(1));

        Arc::new(Self {
            settings,
            registry,
            feed,
            relay_tx,
            relay_rx: Mutex::new(Some(relay_rx)),
            shutdown: watch::channel(false).0,
            disconnect: watch::channel(false).0,
            closed: watch::channel(false).0,
            state: AtomicU8::new(HubState::Created as u8),
            feed_tasks: TaskCounter::new(),
            tasks: TaskCounter::new(),
            metrics,
        })
    }

    pub fn state(&self) -> HubState {
        HubState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Tasks the hub is still waiting on (supervisors, listener, decode loop)
    pub fn active_tasks(&self) -> usize {
        self.feed_tasks.active() + self.tasks.active()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            state: self.state(),
            users: self.registry.user_count(),
            connections: self.registry.connection_count(),
            queued_writes: self.registry.dispatcher().queued(),
            active_tasks: self.active_tasks(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn transition(&self, from: HubState, to: HubState) -> Result<(), HubState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(HubState::from_u8)
    }

    // ========================================================================
    // PROCESS
    // ========================================================================

    /// Start the workers and listener, then decode change events until the
    /// hub closes
    ///
    /// Returns once `close()` has finished. Only one call may run.
    pub async fn process(&self) -> HubResult<()> {
        // Counted before the state check so close() cannot miss this task
        let guard = self.feed_tasks.enter();
        if let Err(found) = self.transition(HubState::Created, HubState::Running) {
            return Err(HubError::InvalidState {
                expected: HubState::Created.as_str(),
                found: found.as_str(),
            });
        }

        let relay_rx = self.relay_rx.lock().take();
        let Some(mut relay_rx) = relay_rx else {
            return Err(HubError::InvalidState {
                expected: HubState::Created.as_str(),
                found: HubState::Running.as_str(),
            });
        };

        self.registry.start();

        let listener = ChangeEventListener::new(
            Arc::clone(&self.feed),
            self.settings.topic.clone(),
            self.relay_tx.clone(),
            Arc::clone(&self.metrics),
        );
        self.feed_tasks.spawn(listener.listen(self.shutdown.subscribe()));

        logger::info(
            LogTag::Hub,
            &format!(
                "🚀 Hub running ({} write workers, queue {}, feed {})",
                self.settings.write_workers,
                self.settings.write_queue_capacity,
                self.feed.name()
            ),
        );

        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                biased;
                _ = signalled(&mut shutdown) => break,
                raw = relay_rx.recv() => match raw {
                    Some(raw) => {
                        self.handle_raw(&raw);
                    }
                    None => break,
                },
            }
        }

        drop(relay_rx);
        drop(guard);
        signalled(&mut self.closed.subscribe()).await;
        Ok(())
    }

    /// Decode one change event and fan it out; malformed events are dropped
    fn handle_raw(&self, raw: &str) -> Option<FanoutReport> {
        match Notification::parse(raw) {
            Ok(notification) => {
                let report = self.registry.send_notification(&notification);
                logger::debug(
                    LogTag::Hub,
                    &format!(
                        "Fan-out: {} targeted, {} queued, {} dropped",
                        report.targeted, report.enqueued, report.dropped
                    ),
                );
                Some(report)
            }
            Err(e) => {
                self.metrics.notification_malformed();
                logger::warning(
                    LogTag::Hub,
                    &format!("Discarding malformed change event: {}", e),
                );
                None
            }
        }
    }

    // ========================================================================
    // ACCEPT
    // ========================================================================

    /// Supervise one client connection for its whole lifetime
    ///
    /// Registers the connection, starts its keepalive and read loop, waits
    /// until the connection asks to close or the hub has drained its write
    /// queue during shutdown, then unregisters and closes it.
    pub async fn accept(
        &self,
        user_id: i64,
        mut sink: Box<dyn FrameSink>,
        stream: Box<dyn FrameStream>,
    ) {
        // Counted before the state check so close() cannot miss this task
        let _guard = self.tasks.enter();

        if self.state() >= HubState::Closing {
            logger::debug(
                LogTag::Hub,
                &format!("Rejecting user {}: hub is shutting down", user_id),
            );
            drop(stream);
            let _ = tokio::time::timeout(self.settings.write_timeout, sink.close()).await;
            return;
        }

        let connection = Connection::new(user_id, sink, self.settings.connection());
        if !self.registry.add(&connection) {
            drop(stream);
            connection.close().await;
            return;
        }

        logger::info(
            LogTag::Hub,
            &format!("🔌 User {} connected ({})", user_id, connection.id()),
        );

        connection.start_read_loop(stream, self.settings.timeout);
        connection.start_keepalive(self.settings.timeout);

        let mut disconnect = self.disconnect.subscribe();
        tokio::select! {
            _ = signalled(&mut disconnect) => {}
            _ = connection.wait_close_requested() => {}
        }

        self.registry.remove(&connection);
        connection.close().await;

        logger::info(
            LogTag::Hub,
            &format!("User {} disconnected ({})", user_id, connection.id()),
        );
    }

    // ========================================================================
    // CLOSE
    // ========================================================================

    /// Shut the hub down and wait until everything it started has finished
    ///
    /// Idempotent; concurrent callers all return once the hub is closed.
    pub async fn close(&self) {
        let started = self
            .transition(HubState::Running, HubState::Closing)
            .or_else(|_| self.transition(HubState::Created, HubState::Closing))
            .is_ok();

        if !started {
            signalled(&mut self.closed.subscribe()).await;
            return;
        }

        logger::info(LogTag::Hub, "🛑 Hub closing");
        self.shutdown.send_replace(true);
        self.feed_tasks.wait_idle().await;

        // Connections are still open here, so the backlog is delivered
        self.registry.close().await;

        self.disconnect.send_replace(true);
        self.tasks.wait_idle().await;

        self.state.store(HubState::Closed as u8, Ordering::SeqCst);
        self.closed.send_replace(true);
        logger::info(LogTag::Hub, "✅ Hub closed");
    }
}
