//! The admission pipeline: local rate limit, then policy oracle, then the
//! authentication gate. The first deny wins.

use std::sync::Arc;

use crate::domain::{ClientKey, IdentityContext, InboundRequest, PolicyDecision, RateLimitDecision};
use crate::ports::{AuthError, AuthGate};

use super::{LocalRateLimiter, PolicyOracleClient};

/// Which stage settled the request, and how.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Admitted(IdentityContext),
    RateLimited,
    PolicyDenied(PolicyDecision),
    AuthRejected(AuthError),
}

/// Result of [`AdmissionPipeline::admit`].
///
/// The local limiter always runs, so its decision is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionOutcome {
    pub rate_limit: RateLimitDecision,
    pub verdict: Verdict,
}

impl AdmissionOutcome {
    pub const RATE_LIMITED_BODY: &'static str = "Blocked by rate limiter";
    pub const POLICY_DENIED_BODY: &'static str = "Blocked by policy";

    pub fn proceed(&self) -> bool {
        matches!(self.verdict, Verdict::Admitted(_))
    }

    pub fn status(&self) -> u16 {
        match &self.verdict {
            Verdict::Admitted(_) => 200,
            Verdict::RateLimited => 429,
            Verdict::PolicyDenied(_) => 403,
            Verdict::AuthRejected(e) => e.status_code(),
        }
    }

    pub fn body(&self) -> String {
        match &self.verdict {
            Verdict::Admitted(_) => String::new(),
            Verdict::RateLimited => Self::RATE_LIMITED_BODY.to_string(),
            Verdict::PolicyDenied(_) => Self::POLICY_DENIED_BODY.to_string(),
            Verdict::AuthRejected(e) => e.to_string(),
        }
    }

    pub fn identity(&self) -> Option<&IdentityContext> {
        match &self.verdict {
            Verdict::Admitted(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Result of [`AdmissionPipeline::protect`]: the limiter and oracle stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectOutcome {
    pub rate_limit: RateLimitDecision,
    /// `None` when the local limiter denied and the oracle was skipped.
    pub policy: Option<PolicyDecision>,
}

impl ProtectOutcome {
    pub const LOCAL_RATE_LIMIT: &'static str = "local-rate-limit";

    pub fn allowed(&self) -> bool {
        self.rate_limit.allowed && self.policy.as_ref().is_none_or(|p| p.allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.policy {
            None => Some(Self::LOCAL_RATE_LIMIT),
            Some(policy) => policy.reason.as_deref(),
        }
    }
}

/// Built once at startup and shared by every request handler.
#[derive(Clone)]
pub struct AdmissionPipeline {
    limiter: LocalRateLimiter,
    oracle: PolicyOracleClient,
    gate: Arc<dyn AuthGate>,
}

impl AdmissionPipeline {
    pub fn new(limiter: LocalRateLimiter, oracle: PolicyOracleClient, gate: Arc<dyn AuthGate>) -> Self {
        Self {
            limiter,
            oracle,
            gate,
        }
    }

    pub fn limiter(&self) -> &LocalRateLimiter {
        &self.limiter
    }

    pub fn oracle(&self) -> &PolicyOracleClient {
        &self.oracle
    }

    pub async fn admit(&self, request: &InboundRequest) -> AdmissionOutcome {
        self.admit_with_hint(request, None).await
    }

    /// Run all stages, with `user_hint` naming a user already known to the
    /// caller. The hint selects the rate limit bucket and is forwarded to the
    /// oracle; it is not an authentication.
    ///
    /// Counters are updated before the first await, so dropping the returned
    /// future mid-flight leaves them consistent.
    pub async fn admit_with_hint(
        &self,
        request: &InboundRequest,
        user_hint: Option<&str>,
    ) -> AdmissionOutcome {
        let key = ClientKey::derive(request, user_hint);
        let ProtectOutcome { rate_limit, policy } = self.protect_key(&key, request, user_hint).await;
        match policy {
            None => {
                return AdmissionOutcome {
                    rate_limit,
                    verdict: Verdict::RateLimited,
                };
            }
            Some(policy) if !policy.allowed => {
                return AdmissionOutcome {
                    rate_limit,
                    verdict: Verdict::PolicyDenied(policy),
                };
            }
            Some(_) => {}
        }

        let verdict = match self.gate.verify(request).await {
            Ok(identity) => {
                tracing::debug!(key = %key, subject = %identity.subject, "Request admitted");
                Verdict::Admitted(identity)
            }
            Err(e @ AuthError::Misconfigured(_)) => {
                tracing::error!(error = %e, "Authentication gate failure");
                Verdict::AuthRejected(e)
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Authentication rejected");
                Verdict::AuthRejected(e)
            }
        };

        AdmissionOutcome {
            rate_limit,
            verdict,
        }
    }

    /// Run only the local limiter and the policy oracle. The request counts
    /// against its rate limit bucket exactly as in [`Self::admit_with_hint`],
    /// but the authentication gate is never consulted.
    pub async fn protect(&self, request: &InboundRequest, user_hint: Option<&str>) -> ProtectOutcome {
        let key = ClientKey::derive(request, user_hint);
        self.protect_key(&key, request, user_hint).await
    }

    async fn protect_key(
        &self,
        key: &ClientKey,
        request: &InboundRequest,
        user_hint: Option<&str>,
    ) -> ProtectOutcome {
        let rate_limit = self.limiter.check_key(key);
        if !rate_limit.allowed {
            tracing::warn!(
                key = %key,
                count = rate_limit.count,
                reset_at = %rate_limit.reset_at,
                "Rate limit exceeded"
            );
            return ProtectOutcome {
                rate_limit,
                policy: None,
            };
        }

        let policy = self.oracle.evaluate(request, user_hint).await;
        if !policy.allowed {
            tracing::warn!(
                key = %key,
                reason = policy.reason.as_deref().unwrap_or_default(),
                "Request blocked by policy oracle"
            );
        }

        ProtectOutcome {
            rate_limit,
            policy: Some(policy),
        }
    }
}
