//! Ports - trait definitions for the pipeline's collaborators.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod clock;
mod oracle;
mod rate_limit;

pub use auth::{AuthError, AuthGate};
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use oracle::{OracleError, OracleUser, PolicyOracle};
pub use rate_limit::WindowCounterStore;
