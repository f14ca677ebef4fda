//! Application configuration loaded from environment variables.

use std::env;

use warden_infra::{JwtConfig, RateLimitConfig};

#[cfg(feature = "oracle")]
use warden_infra::OracleConfig;

/// Paths that bypass admission entirely.
pub const DEFAULT_PUBLIC_PATHS: [&str; 4] = [
    "/.well-known/oauth-authorization-server",
    "/.well-known/oauth-protected-resource",
    "/api/health",
    "/api/admission/status",
];

/// Application configuration. Read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    #[cfg(feature = "oracle")]
    pub oracle: Option<OracleConfig>,
    pub jwt: JwtConfig,
    pub public_paths: Vec<String>,
    /// Identifier of this server as an OAuth protected resource.
    pub resource_url: String,
    pub authorization_servers: Vec<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let public_paths = env::var("PUBLIC_PATHS")
            .ok()
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect());

        Self {
            resource_url: env::var("RESOURCE_URL")
                .unwrap_or_else(|_| format!("http://{}:{}/api", host, port)),
            authorization_servers: env::var("AUTHORIZATION_SERVERS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            host,
            port,
            rate_limit: RateLimitConfig::from_env(),
            #[cfg(feature = "oracle")]
            oracle: OracleConfig::from_env(),
            jwt: JwtConfig::from_env(),
            public_paths,
        }
    }

    #[cfg(feature = "oracle")]
    pub fn oracle_rules_configured(&self) -> bool {
        self.oracle
            .as_ref()
            .map(|o| !o.rules.is_empty())
            .unwrap_or(false)
    }

    #[cfg(not(feature = "oracle"))]
    pub fn oracle_rules_configured(&self) -> bool {
        false
    }
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
