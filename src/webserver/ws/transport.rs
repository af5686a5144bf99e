//! Transport seam between the hub and the socket library
//!
//! The hub only needs to write frames, read frames and close. Keeping that
//! behind two small traits lets the upgraded axum socket and in-memory test
//! peers drive the same connection code.
use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::errors::{HubError, HubResult};

/// Frames exchanged with a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Write half of a client transport
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send_frame(&mut self, frame: Frame) -> HubResult<()>;

    /// Flush and shut the write half down
    async fn close(&mut self) -> HubResult<()>;
}

/// Read half of a client transport
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// `None` once the peer is gone
    async fn next_frame(&mut self) -> Option<HubResult<Frame>>;
}

// ============================================================================
// AXUM WEBSOCKET
// ============================================================================

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "".into(),
            })),
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(data) => Frame::Binary(data),
            Message::Ping(data) => Frame::Ping(data),
            Message::Pong(data) => Frame::Pong(data),
            Message::Close(_) => Frame::Close,
        }
    }
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: Frame) -> HubResult<()> {
        SinkExt::send(self, Message::from(frame))
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> HubResult<()> {
        SinkExt::close(self)
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }
}

#[async_trait]
impl FrameStream for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<HubResult<Frame>> {
        StreamExt::next(self).await.map(|result| {
            result
                .map(Frame::from)
                .map_err(|e| HubError::Transport(e.to_string()))
        })
    }
}

/// Split an upgraded socket into boxed hub transport halves
pub fn split_socket(socket: WebSocket) -> (Box<dyn FrameSink>, Box<dyn FrameStream>) {
    let (sink, stream) = socket.split();
    (Box::new(sink), Box::new(stream))
}
