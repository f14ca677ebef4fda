//! Local, in-process rate limiting stage.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{ClientKey, InboundRequest, RateLimitDecision};
use crate::error::ConfigError;
use crate::ports::WindowCounterStore;

/// Longest accepted window.
const MAX_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Validated window length and per-key quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    window: Duration,
    max_requests: u32,
}

impl RateLimitSettings {
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, ConfigError> {
        if window < Duration::from_secs(1) || window > MAX_WINDOW {
            return Err(ConfigError::InvalidWindow {
                got: window,
                max: MAX_WINDOW,
            });
        }
        if max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }

        Ok(Self {
            window,
            max_requests,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 60,
        }
    }
}

/// First admission stage. Synchronous and I/O free so it can run
/// unconditionally ahead of the network-bound stages.
#[derive(Clone)]
pub struct LocalRateLimiter {
    store: Arc<dyn WindowCounterStore>,
    settings: RateLimitSettings,
}

impl LocalRateLimiter {
    pub fn new(store: Arc<dyn WindowCounterStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn check(&self, request: &InboundRequest, identity_hint: Option<&str>) -> RateLimitDecision {
        let key = ClientKey::derive(request, identity_hint);
        self.check_key(&key)
    }

    pub fn check_key(&self, key: &ClientKey) -> RateLimitDecision {
        let decision =
            self.store
                .record_and_check(key, self.settings.window, self.settings.max_requests);

        tracing::trace!(
            key = %key,
            count = decision.count,
            remaining = decision.remaining,
            allowed = decision.allowed,
            "Local rate limit checked"
        );

        decision
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    pub fn store(&self) -> &Arc<dyn WindowCounterStore> {
        &self.store
    }

    /// Drop expired windows from the backing store.
    pub fn sweep(&self) -> usize {
        self.store.sweep_expired(self.settings.window)
    }
}
