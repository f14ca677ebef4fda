//! Identity extractor for handlers behind the admission middleware.

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use std::future::{Ready, ready};

use warden_core::domain::IdentityContext;

use crate::middleware::error::AppError;

/// Identity attached by the admission pipeline.
///
/// Use this in handlers that sit behind admission:
/// ```ignore
/// async fn protected_route(identity: Identity) -> impl Responder {
///     format!("Hello, {}!", identity.subject)
/// }
/// ```
///
/// A handler that asks for an identity on a route admission skipped is a
/// wiring bug, so a missing context is a 500, never an anonymous pass.
#[derive(Debug, Clone)]
pub struct Identity(pub IdentityContext);

impl std::ops::Deref for Identity {
    type Target = IdentityContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<IdentityContext>() {
            Some(identity) => ready(Ok(Identity(identity.clone()))),
            None => {
                tracing::error!(path = %req.path(), "Identity context missing on protected route");
                ready(Err(AppError::Internal(
                    "Identity context missing".to_string(),
                )))
            }
        }
    }
}
