//! Application state - shared across all handlers.

use std::sync::Arc;

use warden_core::ConfigError;
use warden_core::ports::{AuthGate, WindowCounterStore};
use warden_core::services::{AdmissionPipeline, LocalRateLimiter, PolicyOracleClient};
use warden_infra::{InMemoryWindowStore, JwtAuthGate};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AdmissionPipeline>,
    pub public_paths: Arc<[String]>,
    pub rules_configured: bool,
    pub resource_url: String,
    pub authorization_servers: Vec<String>,
}

impl AppState {
    /// Build the admission pipeline and everything it depends on.
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let gate: Arc<dyn AuthGate> = Arc::new(JwtAuthGate::new(config.jwt.clone()));
        Self::with_gate(config, gate)
    }

    pub fn with_gate(config: &AppConfig, gate: Arc<dyn AuthGate>) -> Result<Self, ConfigError> {
        let settings = config.rate_limit.settings()?;
        let store: Arc<dyn WindowCounterStore> =
            Arc::new(InMemoryWindowStore::from_config(&config.rate_limit));
        let limiter = LocalRateLimiter::new(store, settings);

        let oracle = build_oracle(config)?;

        tracing::info!(
            window_secs = settings.window().as_secs(),
            max_requests = settings.max_requests(),
            max_keys = config.rate_limit.max_keys,
            oracle = oracle.is_configured(),
            "Admission pipeline initialized"
        );

        Ok(Self {
            pipeline: Arc::new(AdmissionPipeline::new(limiter, oracle, gate)),
            public_paths: config.public_paths.clone().into(),
            rules_configured: config.oracle_rules_configured(),
            resource_url: config.resource_url.clone(),
            authorization_servers: config.authorization_servers.clone(),
        })
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[cfg(feature = "oracle")]
fn build_oracle(config: &AppConfig) -> Result<PolicyOracleClient, ConfigError> {
    use warden_infra::HttpPolicyOracle;

    let Some(oracle_config) = &config.oracle else {
        return Ok(PolicyOracleClient::disabled());
    };

    match HttpPolicyOracle::new(oracle_config.clone()) {
        Ok(oracle) => PolicyOracleClient::new(Arc::new(oracle), oracle_config.timeout),
        Err(e) => {
            tracing::error!(
                error = %e,
                oracle_unreachable = true,
                "Failed to build policy oracle client. Running without oracle."
            );
            Ok(PolicyOracleClient::disabled())
        }
    }
}

#[cfg(not(feature = "oracle"))]
fn build_oracle(_config: &AppConfig) -> Result<PolicyOracleClient, ConfigError> {
    tracing::info!("Running without oracle feature - policy stage disabled");
    Ok(PolicyOracleClient::disabled())
}
