//! OAuth discovery documents.

use actix_web::{HttpResponse, web};

use warden_shared::dto::ProtectedResourceMetadata;

use crate::state::AppState;

/// GET /.well-known/oauth-protected-resource[/{resource}]
pub async fn protected_resource(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ProtectedResourceMetadata {
        resource: state.resource_url.clone(),
        authorization_servers: state.authorization_servers.clone(),
        bearer_methods_supported: vec!["header".to_string()],
    })
}
