//! Per-connection relay rate limiting.
//!
//! One timestamp per connection: a relay is accepted if at least
//! `min_interval` has passed since the last *accepted* relay. Rejected
//! relays are dropped, never queued, and don't move the timestamp.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use duolink_transport::ConnectionId;

/// Minimum-interval gate for relayed messages.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_accepted: HashMap<ConnectionId, Instant>,
}

impl RateLimiter {
    /// 20 ms, roughly 50 relays per second per connection.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);

    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: HashMap::new(),
        }
    }

    /// Decides whether a relay from `conn_id` at `now` may pass.
    pub fn allow(&mut self, conn_id: ConnectionId, now: Instant) -> bool {
        if let Some(&last) = self.last_accepted.get(&conn_id) {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_accepted.insert(conn_id, now);
        true
    }

    /// Drops the connection's timestamp. Called on close.
    pub fn forget(&mut self, conn_id: ConnectionId) {
        self.last_accepted.remove(&conn_id);
    }

    /// Number of connections with a recorded timestamp.
    pub fn tracked(&self) -> usize {
        self.last_accepted.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
