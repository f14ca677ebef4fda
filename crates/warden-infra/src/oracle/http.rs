//! HTTP policy oracle client using reqwest.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use warden_core::domain::InboundRequest;
use warden_core::ports::{OracleError, OracleUser, PolicyOracle};
use warden_core::services::DEFAULT_ORACLE_TIMEOUT;

pub const DEFAULT_ORACLE_URL: &str = "http://127.0.0.1:8787/v1/decide";

/// Headers never forwarded to the oracle.
const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "proxy-authorization"];

/// Parse a JSON rule list. Anything but a JSON array is logged and replaced
/// by an empty list so a bad value never blocks startup.
pub fn parse_rules(raw: Option<&str>) -> Vec<Value> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(rules)) => rules,
        Ok(other) => {
            tracing::warn!(
                kind = json_kind(&other),
                "POLICY_ORACLE_RULES is not a JSON array, falling back to empty rules"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "POLICY_ORACLE_RULES is not valid JSON, falling back to empty rules");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Policy oracle configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Credential sent as a bearer token.
    pub key: String,
    pub endpoint: String,
    /// Declarative rules passed through on every call.
    pub rules: Vec<Value>,
    pub timeout: Duration,
}

impl OracleConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            endpoint: DEFAULT_ORACLE_URL.to_string(),
            rules: Vec::new(),
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    /// Load from environment. `None` when `POLICY_ORACLE_KEY` is unset, which
    /// disables the oracle stage.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("POLICY_ORACLE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let Some(key) = key else {
            tracing::warn!("POLICY_ORACLE_KEY not set - policy oracle disabled");
            return None;
        };

        Some(Self {
            key,
            endpoint: std::env::var("POLICY_ORACLE_URL")
                .unwrap_or_else(|_| DEFAULT_ORACLE_URL.to_string()),
            rules: parse_rules(std::env::var("POLICY_ORACLE_RULES").ok().as_deref()),
            timeout: std::env::var("POLICY_ORACLE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ORACLE_TIMEOUT),
        })
    }
}

#[derive(Serialize)]
struct DecideRequest<'a> {
    request: RequestSummary<'a>,
    user: Option<&'a OracleUser>,
    rules: &'a [Value],
}

#[derive(Serialize)]
struct RequestSummary<'a> {
    method: &'a str,
    path: &'a str,
    headers: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
}

impl<'a> RequestSummary<'a> {
    fn from_request(request: &'a InboundRequest) -> Self {
        let mut headers = BTreeMap::new();
        for (name, value) in request.headers() {
            if !REDACTED_HEADERS.contains(&name) {
                headers.entry(name).or_insert(value);
            }
        }

        Self {
            method: &request.method,
            path: &request.path,
            headers,
            ip: request.peer_addr.as_deref(),
        }
    }
}

/// Oracle reached over HTTP: one JSON POST per evaluation.
pub struct HttpPolicyOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl HttpPolicyOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        tracing::info!(
            endpoint = %config.endpoint,
            rules = config.rules.len(),
            timeout_ms = config.timeout.as_millis() as u64,
            "Policy oracle client configured"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn transport_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.config.timeout)
        } else {
            OracleError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl PolicyOracle for HttpPolicyOracle {
    async fn protect(
        &self,
        request: &InboundRequest,
        user: Option<&OracleUser>,
    ) -> Result<Option<Value>, OracleError> {
        let body = DecideRequest {
            request: RequestSummary::from_request(request),
            user,
            rules: &self.config.rules,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice::<Value>(&bytes)
            .map(Some)
            .map_err(|e| OracleError::Decode(e.to_string()))
    }
}
