/// Write dispatcher
///
/// Fixed pool of writer tasks draining one bounded queue of
/// (connection, payload) pairs. Producers never wait: a full queue drops the
/// item for that receiver.
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::errors::HubError;
use crate::logger::{self, LogTag};

use super::{connection::Connection, metrics::HubMetrics, tasks::TaskCounter};

/// One pending write
#[derive(Debug)]
pub struct WriteWork {
    pub connection: Arc<Connection>,
    pub payload: Arc<str>,
}

/// Outcome of handing work to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// Queue at capacity; the item was dropped
    Full,
    /// Dispatcher shut down; the item was dropped
    Closed,
}

pub struct WriteDispatcher {
    sender: RwLock<Option<mpsc::Sender<WriteWork>>>,
    receiver: Arc<Mutex<mpsc::Receiver<WriteWork>>>,
    workers: usize,
    started: AtomicBool,
    tasks: Arc<TaskCounter>,
    metrics: Arc<HubMetrics>,
}

impl WriteDispatcher {
    pub fn new(workers: usize, capacity: usize, metrics: Arc<HubMetrics>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Arc::new(Mutex::new(receiver)),
            workers: workers.max(1),
            started: AtomicBool::new(false),
            tasks: TaskCounter::new(),
            metrics,
        }
    }

    /// Spawn the writer pool; later calls do nothing
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        for worker_id in 0..self.workers {
            let receiver = Arc::clone(&self.receiver);
            let metrics = Arc::clone(&self.metrics);
            self.tasks.spawn(run_worker(worker_id, receiver, metrics));
        }

        logger::debug(
            LogTag::Dispatcher,
            &format!("Started {} write workers", self.workers),
        );
    }

    /// Queue work without waiting
    pub fn enqueue(&self, work: WriteWork) -> Enqueue {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            self.metrics.write_dropped();
            return Enqueue::Closed;
        };

        match sender.try_send(work) {
            Ok(()) => {
                self.metrics.write_enqueued();
                Enqueue::Queued
            }
            Err(mpsc::error::TrySendError::Full(work)) => {
                self.metrics.write_dropped();
                logger::warning(
                    LogTag::Dispatcher,
                    &format!(
                        "Write queue full, dropping message for connection {}",
                        work.connection.id()
                    ),
                );
                Enqueue::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.write_dropped();
                Enqueue::Closed
            }
        }
    }

    /// Items waiting for a worker
    pub fn queued(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map(|sender| sender.max_capacity() - sender.capacity())
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Refuse new work, drain what is queued and join the workers
    ///
    /// Idempotent. Writes to connections that closed meanwhile are dropped.
    pub async fn close(&self) {
        let sender = self.sender.write().take();
        if sender.is_some() {
            logger::debug(LogTag::Dispatcher, "Write queue closed, draining");
        }
        drop(sender);

        if self.started.load(Ordering::SeqCst) {
            self.tasks.wait_idle().await;
        } else {
            let mut receiver = self.receiver.lock().await;
            while let Ok(work) = receiver.try_recv() {
                self.metrics.write_discarded();
                drop(work);
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<WriteWork>>>,
    metrics: Arc<HubMetrics>,
) {
    loop {
        // Lock only while waiting; the write itself runs unlocked
        let work = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(work) = work else {
            break;
        };

        match work.connection.write_bytes(&work.payload).await {
            Ok(()) => metrics.write_sent(),
            Err(HubError::ConnectionClosed { .. }) => metrics.write_discarded(),
            Err(e) => {
                metrics.write_failed();
                logger::debug(
                    LogTag::Dispatcher,
                    &format!(
                        "Worker {} failed writing to {}: {}",
                        worker_id,
                        work.connection.id(),
                        e
                    ),
                );
            }
        }
    }

    logger::verbose(LogTag::Dispatcher, &format!("Worker {} stopped", worker_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::connection::ConnectionSettings;
    use crate::webserver::ws::testing::{mock_transport, MockOptions, MockPeer};
    use std::time::Duration;

    fn connection() -> (Arc<Connection>, MockPeer) {
        let (sink, _stream, peer) = mock_transport(MockOptions::default());
        let settings = ConnectionSettings {
            write_timeout: Duration::from_millis(200),
            close_grace: Duration::from_millis(100),
        };
        (Connection::new(7, sink, settings), peer)
    }

    #[tokio::test]
    async fn test_drop_on_full() {
        let metrics = HubMetrics::new();
        let dispatcher = WriteDispatcher::new(2, 2, Arc::clone(&metrics));
        let (conn, _peer) = connection();

        assert_eq!(conn.send(&dispatcher, Arc::from("1")), Enqueue::Queued);
        assert_eq!(conn.send(&dispatcher, Arc::from("2")), Enqueue::Queued);
        assert_eq!(conn.send(&dispatcher, Arc::from("3")), Enqueue::Full);
        assert_eq!(dispatcher.queued(), 2);
        assert_eq!(metrics.snapshot().writes_dropped, 1);
    }

    #[tokio::test]
    async fn test_close_drains_queue_in_order() {
        let metrics = HubMetrics::new();
        let dispatcher = WriteDispatcher::new(1, 8, Arc::clone(&metrics));
        let (conn, mut peer) = connection();

        for payload in ["a", "b", "c"] {
            conn.send(&dispatcher, Arc::from(payload));
        }
        dispatcher.start();
        dispatcher.close().await;

        assert_eq!(peer.next_text().await.as_deref(), Some("a"));
        assert_eq!(peer.next_text().await.as_deref(), Some("b"));
        assert_eq!(peer.next_text().await.as_deref(), Some("c"));
        assert_eq!(metrics.snapshot().writes_sent, 3);
        assert_eq!(dispatcher.tasks.active(), 0);
    }

    #[tokio::test]
    async fn test_nothing_enqueued_after_close() {
        let metrics = HubMetrics::new();
        let dispatcher = WriteDispatcher::new(3, 8, Arc::clone(&metrics));
        dispatcher.start();
        dispatcher.close().await;
        dispatcher.close().await;

        let (conn, _peer) = connection();
        assert_eq!(conn.send(&dispatcher, Arc::from("late")), Enqueue::Closed);
        assert!(dispatcher.is_closed());
        assert_eq!(dispatcher.queued(), 0);
    }

    #[tokio::test]
    async fn test_writes_to_closed_connection_are_discarded() {
        let metrics = HubMetrics::new();
        let dispatcher = WriteDispatcher::new(2, 8, Arc::clone(&metrics));
        let (conn, _peer) = connection();

        conn.close().await;
        conn.send(&dispatcher, Arc::from("gone"));
        dispatcher.start();
        dispatcher.close().await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.writes_discarded, 1);
        assert_eq!(snapshot.writes_sent, 0);
    }

    #[tokio::test]
    async fn test_close_without_start_discards_backlog() {
        let metrics = HubMetrics::new();
        let dispatcher = WriteDispatcher::new(2, 8, Arc::clone(&metrics));
        let (conn, _peer) = connection();
        conn.send(&dispatcher, Arc::from("x"));
        conn.send(&dispatcher, Arc::from("y"));

        dispatcher.close().await;
        assert_eq!(metrics.snapshot().writes_discarded, 2);
    }
}
