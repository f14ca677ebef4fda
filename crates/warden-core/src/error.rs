//! Configuration errors raised while assembling the pipeline.

use std::time::Duration;

use thiserror::Error;

/// Rejected settings - the pipeline refuses to start with these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Rate limit window must be between 1 second and {max:?}, got {got:?}")]
    InvalidWindow { got: Duration, max: Duration },

    #[error("Rate limit max requests must be at least 1")]
    ZeroMaxRequests,

    #[error("Oracle timeout must be non-zero")]
    ZeroOracleTimeout,
}
