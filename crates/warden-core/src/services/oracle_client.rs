//! Policy oracle stage: one bounded call, normalized, failing open.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{InboundRequest, PolicyDecision};
use crate::error::ConfigError;
use crate::ports::{OracleError, OracleUser, PolicyOracle};

use super::normalize_decision;

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Wraps an optional [`PolicyOracle`].
///
/// Never returns an error: an absent oracle, a failed call, and a timed out
/// call all yield an allow carrying the reason. An operator who wants
/// fail-closed behaviour has to alarm on the `oracle_unreachable` log field
/// instead.
#[derive(Clone)]
pub struct PolicyOracleClient {
    oracle: Option<Arc<dyn PolicyOracle>>,
    timeout: Duration,
}

impl PolicyOracleClient {
    pub fn new(oracle: Arc<dyn PolicyOracle>, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroOracleTimeout);
        }

        Ok(Self {
            oracle: Some(oracle),
            timeout,
        })
    }

    /// Client with no oracle behind it. Every evaluation allows.
    pub fn disabled() -> Self {
        Self {
            oracle: None,
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn evaluate(
        &self,
        request: &InboundRequest,
        identity_hint: Option<&str>,
    ) -> PolicyDecision {
        let Some(oracle) = &self.oracle else {
            tracing::debug!("Policy oracle not configured, skipping");
            return PolicyDecision::unavailable();
        };

        let user = identity_hint
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| OracleUser { id: id.to_string() });

        let result = tokio::time::timeout(self.timeout, oracle.protect(request, user.as_ref()))
            .await
            .unwrap_or(Err(OracleError::Timeout(self.timeout)));

        match result {
            Ok(raw) => normalize_decision(raw),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    oracle_unreachable = true,
                    path = %request.path,
                    "Policy oracle call failed, failing open"
                );
                PolicyDecision::fail_open(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedOracle {
        response: Result<Option<Value>, OracleError>,
        delay: Duration,
        calls: AtomicUsize,
        last_user: Mutex<Option<OracleUser>>,
    }

    impl ScriptedOracle {
        fn new(response: Result<Option<Value>, OracleError>) -> Self {
            Self {
                response,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_user: Mutex::new(None),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl PolicyOracle for ScriptedOracle {
        async fn protect(
            &self,
            _request: &InboundRequest,
            user: Option<&OracleUser>,
        ) -> Result<Option<Value>, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user.lock().unwrap() = user.cloned();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }

    fn request() -> InboundRequest {
        InboundRequest::new("GET", "/api/mcp").with_header("x-forwarded-for", "1.2.3.4")
    }

    #[tokio::test]
    async fn test_disabled_client_allows() {
        let client = PolicyOracleClient::disabled();
        let decision = client.evaluate(&request(), None).await;

        assert!(!client.is_configured());
        assert!(decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some(PolicyDecision::ORACLE_UNAVAILABLE));
        assert!(decision.raw.is_none());
    }

    #[tokio::test]
    async fn test_explicit_block_denies() {
        let oracle = Arc::new(ScriptedOracle::new(Ok(Some(json!({ "action": "block" })))));
        let client = PolicyOracleClient::new(oracle.clone(), DEFAULT_ORACLE_TIMEOUT).unwrap();

        let decision = client.evaluate(&request(), None).await;

        assert!(!decision.allowed);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_fails_open_with_reason() {
        let oracle = Arc::new(ScriptedOracle::new(Err(OracleError::Transport(
            "connection refused".to_string(),
        ))));
        let client = PolicyOracleClient::new(oracle, DEFAULT_ORACLE_TIMEOUT).unwrap();

        let decision = client.evaluate(&request(), None).await;

        assert!(decision.allowed);
        assert!(decision.reason.unwrap().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_open() {
        let oracle = Arc::new(
            ScriptedOracle::new(Ok(Some(json!({ "action": "block" }))))
                .delayed(Duration::from_secs(30)),
        );
        let client = PolicyOracleClient::new(oracle, Duration::from_millis(200)).unwrap();

        let decision = client.evaluate(&request(), None).await;

        assert!(decision.allowed);
        assert!(decision.reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_user_hint_forwarded() {
        let oracle = Arc::new(ScriptedOracle::new(Ok(None)));
        let client = PolicyOracleClient::new(oracle.clone(), DEFAULT_ORACLE_TIMEOUT).unwrap();

        client.evaluate(&request(), Some("42")).await;
        assert_eq!(
            *oracle.last_user.lock().unwrap(),
            Some(OracleUser {
                id: "42".to_string()
            })
        );

        client.evaluate(&request(), None).await;
        assert_eq!(*oracle.last_user.lock().unwrap(), None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let oracle = Arc::new(ScriptedOracle::new(Ok(None)));
        assert!(matches!(
            PolicyOracleClient::new(oracle, Duration::ZERO),
            Err(ConfigError::ZeroOracleTimeout)
        ));
    }
}
