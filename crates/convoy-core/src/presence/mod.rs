//! Agent presence
//!
//! A [`Pinger`] proves its agent is running by rewriting a heartbeat document
//! at a fixed interval. A [`Watcher`] derives liveness from how recent each
//! heartbeat is and notifies subscribers when that liveness flips.
//!
//! Liveness is only ever "was alive within the last staleness window"; it is
//! never a statement about the present instant.

mod pinger;
mod watcher;

pub use pinger::Pinger;
pub use watcher::{Subscription, Watcher};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Collection holding heartbeat documents
pub const PRESENCE_COLLECTION: &str = "presence";

/// Shortest period a background presence task ticks at
const MIN_TICK: Duration = Duration::from_millis(1);

/// Clamp a configured interval to something `tokio::time::interval` accepts
pub(crate) fn tick_period(interval: Duration) -> Duration {
    interval.max(MIN_TICK)
}

/// A liveness flip observed for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: String,
    pub alive: bool,
}

/// Heartbeat document stored under a presence key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Heartbeat {
    /// Monotonic per-pinger sequence number
    pub beat: u64,
    /// Wall-clock time of the beat, in epoch milliseconds
    pub at: i64,
}

impl Heartbeat {
    /// Whether the beat is within `window_ms` of `now_ms`
    pub fn is_fresh(&self, now_ms: i64, window_ms: i64) -> bool {
        now_ms - self.at <= window_ms
    }
}
