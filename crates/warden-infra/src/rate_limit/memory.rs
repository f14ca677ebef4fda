//! In-memory fixed-window counter store backed by DashMap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use warden_core::ConfigError;
use warden_core::domain::{ClientKey, RateLimitDecision, WindowRecord};
use warden_core::ports::{Clock, SystemClock, WindowCounterStore};
use warden_core::services::RateLimitSettings;

pub const DEFAULT_MAX_KEYS: usize = 100_000;

/// In-memory rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
    /// Upper bound on tracked keys before eviction kicks in.
    pub max_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            window: Duration::from_secs(
                std::env::var("RATE_LIMIT_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_keys: std::env::var("RATE_LIMIT_MAX_KEYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_KEYS),
        }
    }

    pub fn settings(&self) -> Result<RateLimitSettings, ConfigError> {
        RateLimitSettings::new(self.window, self.max_requests)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    record: WindowRecord,
    last_seen: DateTime<Utc>,
}

/// Share of `max_keys` kept after a compaction.
const LOW_WATER_PERCENT: usize = 90;

/// Process-local window counters.
///
/// Each update runs while holding the DashMap entry guard for its key, so
/// the read-check-increment is indivisible per key while different keys
/// only contend when they share a shard.
///
/// Memory is bounded by `max_keys`. A new key arriving at a full store
/// compacts it in one batch: expired windows go first, then the least
/// recently seen keys until the store is back at 90% of capacity. The next
/// tenth of `max_keys` inserts then take the fast path, so a flood of unique
/// keys pays for one full scan per batch instead of one per key. Only one
/// thread compacts at a time; the others insert and leave the bound soft.
/// Note: Limits are per-process, not distributed across instances.
pub struct InMemoryWindowStore {
    slots: DashMap<ClientKey, Slot>,
    clock: Arc<dyn Clock>,
    max_keys: usize,
    compacting: AtomicBool,
    compactions: AtomicU64,
}

impl InMemoryWindowStore {
    pub fn new(max_keys: usize) -> Self {
        Self::with_clock(max_keys, Arc::new(SystemClock))
    }

    pub fn with_clock(max_keys: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: DashMap::new(),
            clock,
            max_keys: max_keys.max(1),
            compacting: AtomicBool::new(false),
            compactions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_keys)
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Number of capacity compactions run so far.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Current window for `key`, if tracked.
    pub fn record(&self, key: &ClientKey) -> Option<WindowRecord> {
        self.slots.get(key).map(|slot| slot.record)
    }

    fn low_water(&self) -> usize {
        self.max_keys * LOW_WATER_PERCENT / 100
    }

    fn make_room(&self, now: DateTime<Utc>, window: Duration) {
        if self
            .compacting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let swept = self.remove_expired(now, window);
        let evicted = self.evict_oldest(self.slots.len().saturating_sub(self.low_water()));
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.compacting.store(false, Ordering::Release);

        tracing::debug!(
            swept,
            evicted,
            remaining = self.slots.len(),
            max_keys = self.max_keys,
            "Window store compacted"
        );
    }

    /// Drop the `excess` least recently seen keys in a single pass.
    fn evict_oldest(&self, excess: usize) -> usize {
        if excess == 0 {
            return 0;
        }

        let mut seen: Vec<DateTime<Utc>> = self.slots.iter().map(|slot| slot.last_seen).collect();
        if seen.is_empty() {
            return 0;
        }
        let nth = excess.min(seen.len()) - 1;
        let (older, cutoff, _) = seen.select_nth_unstable(nth);
        let cutoff = *cutoff;
        let strictly_older = older.iter().filter(|t| **t < cutoff).count();

        // Keys seen exactly at the cutoff are only partly evicted.
        let mut ties = excess.saturating_sub(strictly_older);
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if slot.last_seen < cutoff {
                false
            } else if slot.last_seen == cutoff && ties > 0 {
                ties -= 1;
                false
            } else {
                true
            }
        });
        before.saturating_sub(self.slots.len())
    }

    fn remove_expired(&self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| !slot.record.is_expired(now, window));
        before.saturating_sub(self.slots.len())
    }
}

impl Default for InMemoryWindowStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYS)
    }
}

impl WindowCounterStore for InMemoryWindowStore {
    fn record_and_check(
        &self,
        key: &ClientKey,
        window: Duration,
        max_requests: u32,
    ) -> RateLimitDecision {
        let now = self.clock.now();

        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.last_seen = now;
            return slot.record.hit(now, window, max_requests);
        }

        if self.slots.len() >= self.max_keys {
            self.make_room(now, window);
        }

        // Another request for the same key may have inserted in between.
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.last_seen = now;
                slot.record.hit(now, window, max_requests)
            }
            Entry::Vacant(vacant) => {
                let record = WindowRecord::open(now);
                vacant.insert(Slot {
                    record,
                    last_seen: now,
                });
                record.decision(window, max_requests)
            }
        }
    }

    fn sweep_expired(&self, window: Duration) -> usize {
        self.remove_expired(self.clock.now(), window)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
