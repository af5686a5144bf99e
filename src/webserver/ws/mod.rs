/// Live-update hub module
///
/// Pushes storage change notifications to every connected client of the
/// affected users over a persistent WebSocket.
///
/// ## Architecture
/// - One persistent connection per client tab, many per user
/// - Change events arrive on a single feed topic and are decoded once
/// - Fan-out enqueues writes; a fixed worker pool performs them
/// - Slow or dead clients are cut off without stalling anyone else
///
/// ## Key Components
/// - `hub`: Composition root, lifecycle and per-connection supervision
/// - `connection`: Serialized writes, keepalive, read deadline, close sequence
/// - `registry`: User id → live connections, fan-out
/// - `dispatcher`: Bounded write queue and writer pool
/// - `listener`: Change-feed subscription feeding the hub relay
/// - `feed` / `postgres`: Change-feed backends
/// - `notification`: Change-event decoding and audience resolution
/// - `transport`: Frame-level seam over the socket library
/// - `health`: Keepalive timing
/// - `metrics`: Hub counters for monitoring
/// - `tasks`: Outstanding-task accounting used by every shutdown
pub mod connection;
pub mod dispatcher;
pub mod feed;
pub mod health;
pub mod hub;
pub mod listener;
pub mod metrics;
pub mod notification;
pub mod postgres;
pub mod registry;
pub mod tasks;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use feed::{ChangeFeed, ChangeSubscription, MemoryFeed};
pub use hub::{Hub, HubSettings, HubState, HubStats};
pub use notification::Notification;
pub use postgres::PostgresFeed;
pub use transport::{split_socket, Frame, FrameSink, FrameStream};
