/// Live client connection
///
/// Owns one client transport:
/// - Serialized, time-bounded frame writes
/// - Keepalive pings and a read loop that enforces the read deadline
/// - A one-shot close sequence that joins every task the connection owns
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::errors::{HubError, HubResult};
use crate::logger::{self, LogTag};

use super::{
    dispatcher::{Enqueue, WriteDispatcher, WriteWork},
    health::{ping_ticker, KeepaliveConfig},
    tasks::{signalled, TaskCounter},
    transport::{Frame, FrameSink, FrameStream},
};

/// Per-connection timing
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Upper bound for one frame write, lock wait included
    pub write_timeout: Duration,

    /// How long close waits for the peer to acknowledge
    pub close_grace: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(3),
            close_grace: Duration::from_secs(5),
        }
    }
}

pub struct Connection {
    id: Uuid,
    user_id: i64,
    sink: Mutex<Box<dyn FrameSink>>,
    settings: ConnectionSettings,

    /// Set once by the first `close()` call
    closed: AtomicBool,

    /// Someone asked for the connection to go away
    close_requested: watch::Sender<bool>,

    /// Stops the keepalive and read loop
    close_signal: watch::Sender<bool>,

    /// Read loop has exited (peer closed, failed or went silent)
    peer_done: watch::Sender<bool>,

    /// Close sequence has finished
    close_done: watch::Sender<bool>,

    tasks: Arc<TaskCounter>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Connection {
    pub fn new(user_id: i64, sink: Box<dyn FrameSink>, settings: ConnectionSettings) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            sink: Mutex::new(sink),
            settings,
            closed: AtomicBool::new(false),
            close_requested: watch::channel(false).0,
            close_signal: watch::channel(false).0,
            peer_done: watch::channel(false).0,
            close_done: watch::channel(false).0,
            tasks: TaskCounter::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// True once a close was requested or started
    pub fn is_closing(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || *self.close_requested.borrow()
    }

    /// Tasks still owned by this connection
    pub fn active_tasks(&self) -> usize {
        self.tasks.active()
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Queue a payload for delivery through the dispatcher
    pub fn send(self: &Arc<Self>, dispatcher: &WriteDispatcher, payload: Arc<str>) -> Enqueue {
        dispatcher.enqueue(WriteWork {
            connection: Arc::clone(self),
            payload,
        })
    }

    /// Write a text frame now; only dispatcher workers call this
    ///
    /// Fails with `ConnectionClosed` once the close sequence has started.
    /// A write that leaves the transport unusable requests a close.
    pub async fn write_bytes(&self, payload: &str) -> HubResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.closed_error());
        }

        let result = self.write_frame(Frame::Text(payload.to_string())).await;
        if let Err(e) = &result {
            logger::debug(
                LogTag::Connection,
                &format!("Write to {} failed: {}", self.id, e),
            );
            if e.is_connection_broken() {
                self.close_gracefully();
            }
        }
        result
    }

    /// Send a transport ping; no-op while closing
    pub async fn ping(&self) -> HubResult<()> {
        if self.is_closing() {
            return Ok(());
        }

        let result = self.write_frame(Frame::Ping(Vec::new())).await;
        if let Err(e) = &result {
            logger::debug(
                LogTag::Connection,
                &format!("Ping to {} failed: {}", self.id, e),
            );
            if e.is_connection_broken() {
                self.close_gracefully();
            }
        }
        result
    }

    async fn write_frame(&self, frame: Frame) -> HubResult<()> {
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send_frame(frame).await
        };

        match tokio::time::timeout(self.settings.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(HubError::WriteTimeout {
                millis: self.settings.write_timeout.as_millis() as u64,
            }),
        }
    }

    fn closed_error(&self) -> HubError {
        HubError::ConnectionClosed {
            id: self.id.to_string(),
        }
    }

    // ========================================================================
    // OWNED TASKS
    // ========================================================================

    /// Ping every 9/10 of `timeout` until the connection closes
    pub fn start_keepalive(self: &Arc<Self>, timeout: Duration) {
        let connection = Arc::clone(self);
        let keepalive = KeepaliveConfig::from_timeout(timeout);
        let mut close_rx = self.close_signal.subscribe();

        self.tasks.spawn(async move {
            let mut ticker = ping_ticker(&keepalive);
            loop {
                tokio::select! {
                    _ = signalled(&mut close_rx) => break,
                    _ = ticker.tick() => {
                        if connection.ping().await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Consume inbound frames until the peer closes, errors or stays silent
    /// longer than `timeout`
    ///
    /// Any inbound frame resets the deadline. Payloads are ignored.
    pub fn start_read_loop(self: &Arc<Self>, mut stream: Box<dyn FrameStream>, timeout: Duration) {
        let connection = Arc::clone(self);
        let mut close_rx = self.close_signal.subscribe();

        self.tasks.spawn(async move {
            let reason = loop {
                tokio::select! {
                    _ = signalled(&mut close_rx) => break "closed",
                    read = tokio::time::timeout(timeout, stream.next_frame()) => match read {
                        Err(_) => break "read deadline expired",
                        Ok(None) => break "end of stream",
                        Ok(Some(Err(_))) => break "read error",
                        Ok(Some(Ok(Frame::Close))) => break "peer sent close",
                        Ok(Some(Ok(_))) => continue,
                    },
                }
            };

            logger::debug(
                LogTag::Connection,
                &format!("Read loop for {} stopped: {}", connection.id, reason),
            );
            connection.peer_done.send_replace(true);
            connection.close_gracefully();
        });
    }

    // ========================================================================
    // CLOSE
    // ========================================================================

    /// Ask the supervisor to close this connection; idempotent
    pub fn close_gracefully(&self) {
        if !self.close_requested.send_replace(true) {
            logger::debug(
                LogTag::Connection,
                &format!("Close requested for {} (user {})", self.id, self.user_id),
            );
        }
    }

    /// Resolve once a close was requested
    pub async fn wait_close_requested(&self) {
        signalled(&mut self.close_requested.subscribe()).await;
    }

    /// Run the close sequence exactly once
    ///
    /// 1. send a close frame and wait up to the grace period for the peer
    /// 2. stop the keepalive and read loop
    /// 3. wait for owned tasks
    /// 4. close the transport
    ///
    /// Concurrent callers wait for the first one to finish. Must not be called
    /// from a task the connection owns, since step 3 waits for those.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            signalled(&mut self.close_done.subscribe()).await;
            return;
        }
        self.close_requested.send_replace(true);

        match self.write_frame(Frame::Close).await {
            Ok(()) => {
                let mut peer_done = self.peer_done.subscribe();
                let acknowledged =
                    tokio::time::timeout(self.settings.close_grace, signalled(&mut peer_done))
                        .await
                        .is_ok();
                if !acknowledged {
                    logger::debug(
                        LogTag::Connection,
                        &format!("Peer {} did not acknowledge close in time", self.id),
                    );
                }
            }
            Err(e) => logger::debug(
                LogTag::Connection,
                &format!("Close frame to {} not sent: {}", self.id, e),
            ),
        }

        self.close_signal.send_replace(true);
        self.tasks.wait_idle().await;

        let shutdown = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(self.settings.write_timeout, shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => logger::debug(
                LogTag::Connection,
                &format!("Transport close for {} failed: {}", self.id, e),
            ),
            Err(_) => logger::debug(
                LogTag::Connection,
                &format!("Transport close for {} timed out", self.id),
            ),
        }

        logger::debug(LogTag::Connection, &format!("Connection {} closed", self.id));
        self.close_done.send_replace(true);
    }
}
