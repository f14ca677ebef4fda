//! Window counter storage port.

use std::time::Duration;

use crate::domain::{ClientKey, RateLimitDecision};

/// Keyed fixed-window counters shared by every request handler in a process.
///
/// Implementations must make `record_and_check` indivisible per key: two
/// concurrent calls for the same key must never observe the same count.
/// Calls must not block on I/O.
pub trait WindowCounterStore: Send + Sync {
    /// Count one request for `key` and report whether it fits the limit.
    fn record_and_check(
        &self,
        key: &ClientKey,
        window: Duration,
        max_requests: u32,
    ) -> RateLimitDecision;

    /// Drop every record whose window has ended. Returns how many were removed.
    fn sweep_expired(&self, window: Duration) -> usize;

    /// Number of keys currently tracked.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
