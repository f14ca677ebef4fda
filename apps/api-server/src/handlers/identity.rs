//! Handlers that consume the identity context attached during admission.

use actix_web::HttpResponse;

use warden_shared::dto::IdentityResponse;

use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;

/// GET /api/me - Protected route
pub async fn me(identity: Identity) -> AppResult<HttpResponse> {
    let Identity(context) = identity;

    Ok(HttpResponse::Ok().json(IdentityResponse {
        subject: context.subject,
        email: context.email,
        roles: context.roles,
    }))
}
