//! Policy oracle port.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::InboundRequest;

/// User reference forwarded to the oracle alongside the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleUser {
    pub id: String,
}

/// External policy decision service, consumed as an opaque oracle.
///
/// Implementations return the oracle's decision document unchanged (or `None`
/// when the oracle answered without one); interpreting it is the caller's job.
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    async fn protect(
        &self,
        request: &InboundRequest,
        user: Option<&OracleUser>,
    ) -> Result<Option<Value>, OracleError>;
}

/// Policy oracle errors. Every variant is treated as "no verdict".
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle returned HTTP {0}")]
    Status(u16),

    #[error("Oracle response could not be decoded: {0}")]
    Decode(String),
}
