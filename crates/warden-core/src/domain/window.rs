use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::RateLimitDecision;

/// End of a window opened at `start`, saturating at the maximum timestamp.
pub fn window_end(start: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Per-key fixed-window counter.
///
/// Windows are anchored at the first request of each window, not aligned to
/// the clock, so a burst that straddles a boundary can admit up to twice the
/// limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

impl WindowRecord {
    /// A fresh window holding the request that opened it.
    pub fn open(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    pub fn resets_at(&self, window: Duration) -> DateTime<Utc> {
        window_end(self.window_start, window)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now > self.resets_at(window)
    }

    /// Count one request at `now` and report whether it fits the limit.
    ///
    /// Must be called under whatever exclusion the owning store provides for
    /// this key; the read-check-increment is not atomic on its own.
    pub fn hit(&mut self, now: DateTime<Utc>, window: Duration, max_requests: u32) -> RateLimitDecision {
        if self.is_expired(now, window) {
            *self = Self::open(now);
        } else {
            self.count = self.count.saturating_add(1);
        }

        self.decision(window, max_requests)
    }

    pub fn decision(&self, window: Duration, max_requests: u32) -> RateLimitDecision {
        RateLimitDecision::from_count(self.count, max_requests, self.resets_at(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_open_counts_first_request() {
        let record = WindowRecord::open(t0());
        let decision = record.decision(WINDOW, 3);

        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_at, t0() + TimeDelta::seconds(60));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let mut record = WindowRecord::open(t0());

        let second = record.hit(t0(), WINDOW, 2);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = record.hit(t0(), WINDOW, 2);
        assert!(!third.allowed);
        assert_eq!(third.count, 3);
        assert_eq!(third.remaining, 0);
    }

    #[test]
    fn test_boundary_instant_is_still_inside_window() {
        let mut record = WindowRecord::open(t0());
        let at_boundary = t0() + TimeDelta::seconds(60);

        let decision = record.hit(at_boundary, WINDOW, 5);
        assert_eq!(decision.count, 2);
        assert_eq!(record.window_start, t0());
    }

    #[test]
    fn test_expired_window_resets() {
        let mut record = WindowRecord::open(t0());
        for _ in 0..5 {
            record.hit(t0(), WINDOW, 2);
        }

        let later = t0() + TimeDelta::milliseconds(60_001);
        let decision = record.hit(later, WINDOW, 2);

        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
        assert_eq!(record.window_start, later);
    }

    #[test]
    fn test_window_end_saturates() {
        let end = window_end(t0(), Duration::from_secs(u64::MAX));
        assert_eq!(end, DateTime::<Utc>::MAX_UTC);
    }
}
