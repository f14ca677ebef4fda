//! Authentication gate port.

use async_trait::async_trait;

use crate::domain::{IdentityContext, InboundRequest};

/// Final admission stage: establishes who is calling.
///
/// The pipeline does not reinterpret a rejection; the error's own
/// [`AuthError::status_code`] is what the caller sees.
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn verify(&self, request: &InboundRequest) -> Result<IdentityContext, AuthError>;
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// The gate itself is broken. Fatal to the request, never an allow.
    #[error("Authentication gate misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingAuth | AuthError::TokenExpired | AuthError::InvalidToken(_) => 401,
            AuthError::InsufficientPermissions => 403,
            AuthError::Misconfigured(_) => 500,
        }
    }
}
