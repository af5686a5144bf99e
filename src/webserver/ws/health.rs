/// Connection keepalive timing
///
/// The read deadline and the ping cadence both derive from one timeout:
/// pings go out at 9/10 of it so a healthy peer always answers before the
/// deadline expires.
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

// ============================================================================
// KEEPALIVE CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Max silence from the peer before the connection is considered dead
    pub read_deadline: Duration,

    /// Interval between server pings
    pub ping_interval: Duration,
}

impl KeepaliveConfig {
    pub fn from_timeout(timeout: Duration) -> Self {
        let ping_interval = (timeout * 9 / 10).max(Duration::from_millis(1));
        Self {
            read_deadline: timeout,
            ping_interval,
        }
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self::from_timeout(Duration::from_secs(30))
    }
}

/// Ping ticker; the first tick fires one interval from now
pub fn ping_ticker(config: &KeepaliveConfig) -> Interval {
    let mut ticker = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
