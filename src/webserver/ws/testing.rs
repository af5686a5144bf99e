//! In-memory transport for hub tests
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::{HubError, HubResult};

use super::transport::{Frame, FrameSink, FrameStream};

#[derive(Debug, Clone, Copy, Default)]
pub struct MockOptions {
    /// Answer every ping with a pong
    pub auto_pong: bool,

    /// Answer a close frame with a close frame
    pub auto_close_ack: bool,

    /// Never complete a write
    pub stall_writes: bool,
}

#[derive(Debug, Default)]
struct Counters {
    pings: AtomicUsize,
    close_frames: AtomicUsize,
    sink_closes: AtomicUsize,
}

pub struct MockSink {
    options: MockOptions,
    to_peer: mpsc::UnboundedSender<Frame>,
    to_server: mpsc::UnboundedSender<Frame>,
    counters: Arc<Counters>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_frame(&mut self, frame: Frame) -> HubResult<()> {
        if self.options.stall_writes {
            std::future::pending::<()>().await;
        }

        match &frame {
            Frame::Ping(data) => {
                self.counters.pings.fetch_add(1, Ordering::SeqCst);
                if self.options.auto_pong {
                    let _ = self.to_server.send(Frame::Pong(data.clone()));
                }
            }
            Frame::Close => {
                self.counters.close_frames.fetch_add(1, Ordering::SeqCst);
                if self.options.auto_close_ack {
                    let _ = self.to_server.send(Frame::Close);
                }
            }
            _ => {}
        }

        self.to_peer
            .send(frame)
            .map_err(|_| HubError::Transport("peer dropped".to_string()))
    }

    async fn close(&mut self) -> HubResult<()> {
        self.counters.sink_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockStream {
    from_peer: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_frame(&mut self) -> Option<HubResult<Frame>> {
        self.from_peer.recv().await.map(Ok)
    }
}

/// Client side of a mock transport
pub struct MockPeer {
    from_server: mpsc::UnboundedReceiver<Frame>,
    to_server: mpsc::UnboundedSender<Frame>,
    counters: Arc<Counters>,
}

impl MockPeer {
    /// Next text frame, skipping control frames; `None` after two seconds
    pub async fn next_text(&mut self) -> Option<String> {
        self.text_within(Duration::from_secs(2)).await
    }

    pub async fn text_within(&mut self, wait: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.from_server.recv()).await {
                Ok(Some(Frame::Text(text))) => return Some(text),
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return None,
            }
        }
    }

    pub fn send(&self, frame: Frame) {
        let _ = self.to_server.send(frame);
    }

    pub fn pings(&self) -> usize {
        self.counters.pings.load(Ordering::SeqCst)
    }

    pub fn close_frames(&self) -> usize {
        self.counters.close_frames.load(Ordering::SeqCst)
    }

    pub fn sink_closes(&self) -> usize {
        self.counters.sink_closes.load(Ordering::SeqCst)
    }
}

pub fn mock_transport(
    options: MockOptions,
) -> (Box<dyn FrameSink>, Box<dyn FrameStream>, MockPeer) {
    let (to_peer, from_server) = mpsc::unbounded_channel();
    let (to_server, from_peer) = mpsc::unbounded_channel();
    let counters = Arc::new(Counters::default());

    let sink = MockSink {
        options,
        to_peer,
        to_server: to_server.clone(),
        counters: Arc::clone(&counters),
    };
    let stream = MockStream { from_peer };
    let peer = MockPeer {
        from_server,
        to_server,
        counters,
    };
    (Box::new(sink), Box::new(stream), peer)
}

/// Poll `condition` every 10ms until it holds or `wait` runs out
pub async fn wait_until<F>(wait: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
