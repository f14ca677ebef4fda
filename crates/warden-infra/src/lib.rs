//! # Warden Infrastructure
//!
//! Concrete implementations of the ports defined in `warden-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - Local rate limiting only
//! - `oracle` - HTTP policy oracle client via reqwest
//! - `auth` - JWT authentication gate

pub mod rate_limit;

#[cfg(feature = "auth")]
pub mod auth;

#[cfg(feature = "oracle")]
pub mod oracle;

pub use rate_limit::{InMemoryWindowStore, RateLimitConfig};

#[cfg(feature = "auth")]
pub use auth::{JwtAuthGate, JwtConfig};

#[cfg(feature = "oracle")]
pub use oracle::{HttpPolicyOracle, OracleConfig};
