//! HTTP handlers and route configuration.

mod admission;
mod health;
mod identity;
mod well_known;

use actix_web::{http::Method, web};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/.well-known")
            .route(
                "/oauth-protected-resource",
                web::get().to(well_known::protected_resource),
            )
            .route(
                "/oauth-protected-resource/{resource:.*}",
                web::get().to(well_known::protected_resource),
            ),
    )
    .service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            .service(
                web::resource("/admission/status")
                    .route(web::get().to(admission::status))
                    .route(web::method(Method::OPTIONS).to(admission::preflight)),
            )
            // Behind admission
            .route("/me", web::get().to(identity::me)),
    );
}
