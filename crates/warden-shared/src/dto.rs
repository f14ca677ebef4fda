//! Data Transfer Objects - response bodies of the server's own endpoints.

use serde::{Deserialize, Serialize};

/// GET /api/admission/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionStatusResponse {
    pub oracle_configured: bool,
    pub rules_configured: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max: u32,
    pub tracked_keys: usize,
    /// Limiter and oracle verdict for the calling request itself.
    pub protect: ProtectReport,
}

/// Outcome of the rate limit and policy stages, without authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectReport {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub rate_limit: RateLimitReport,
    /// Absent when the local limiter denied first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitReport {
    pub allowed: bool,
    pub count: u32,
    pub remaining: u32,
    /// RFC 3339 timestamp.
    pub reset_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyReport {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// GET /api/me - the identity context attached by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<String>,
}

/// OAuth 2.0 Protected Resource Metadata (RFC 9728), minimal subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
}

/// GET /api/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}
