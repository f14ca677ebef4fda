//! Policy oracle adapters.

mod http;

pub use http::{DEFAULT_ORACLE_URL, HttpPolicyOracle, OracleConfig, parse_rules};
