//! Services - the admission stages and the pipeline that composes them.

mod normalize;
mod oracle_client;
mod pipeline;
mod rate_limiter;

pub use normalize::normalize_decision;
pub use oracle_client::{DEFAULT_ORACLE_TIMEOUT, PolicyOracleClient};
pub use pipeline::{AdmissionOutcome, AdmissionPipeline, ProtectOutcome, Verdict};
pub use rate_limiter::{LocalRateLimiter, RateLimitSettings};
