use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Outcome of a local rate limit check. Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub count: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn from_count(count: u32, max_requests: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: count <= max_requests,
            count,
            remaining: max_requests.saturating_sub(count),
            reset_at,
        }
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Normalized verdict of the policy oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    /// The oracle's response as received, if there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub const ORACLE_UNAVAILABLE: &'static str = "oracle-unavailable";
    pub const ORACLE_BLOCK: &'static str = "oracle-block";

    pub fn allow(raw: Option<Value>, reason: Option<String>) -> Self {
        Self {
            allowed: true,
            raw,
            reason,
        }
    }

    pub fn deny(raw: Option<Value>, reason: Option<String>) -> Self {
        Self {
            allowed: false,
            raw,
            reason: Some(reason.unwrap_or_else(|| Self::ORACLE_BLOCK.to_string())),
        }
    }

    /// Allow issued because no verdict could be obtained.
    pub fn fail_open(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            raw: None,
            reason: Some(reason.into()),
        }
    }

    pub fn unavailable() -> Self {
        Self::fail_open(Self::ORACLE_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_remaining_never_negative() {
        let now = Utc::now();
        let decision = RateLimitDecision::from_count(7, 5, now);

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let decision = RateLimitDecision::from_count(1, 5, now + TimeDelta::milliseconds(1500));

        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + TimeDelta::seconds(10)), 0);
    }

    #[test]
    fn test_deny_without_reason_uses_default() {
        let decision = PolicyDecision::deny(None, None);
        assert_eq!(decision.reason.as_deref(), Some(PolicyDecision::ORACLE_BLOCK));
    }
}
