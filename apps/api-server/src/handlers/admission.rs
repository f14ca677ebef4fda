//! Admission diagnostics.

use actix_web::{HttpRequest, HttpResponse, web};

use warden_core::services::ProtectOutcome;
use warden_shared::dto::{AdmissionStatusResponse, PolicyReport, ProtectReport, RateLimitReport};

use crate::middleware::admission::inbound_request;
use crate::state::AppState;

/// GET /api/admission/status
///
/// Reports how the pipeline is configured without exposing secrets, plus a
/// live run of the limiter and oracle stages for the caller. That run counts
/// against the caller's rate limit; the authentication gate is skipped.
pub async fn status(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let settings = state.pipeline.limiter().settings();
    let outcome = state.pipeline.protect(&inbound_request(&req), None).await;

    HttpResponse::Ok().json(AdmissionStatusResponse {
        oracle_configured: state.pipeline.oracle().is_configured(),
        rules_configured: state.rules_configured,
        rate_limit_window_secs: settings.window().as_secs(),
        rate_limit_max: settings.max_requests(),
        tracked_keys: state.pipeline.limiter().store().len(),
        protect: protect_report(&outcome),
    })
}

fn protect_report(outcome: &ProtectOutcome) -> ProtectReport {
    ProtectReport {
        allowed: outcome.allowed(),
        reason: outcome.reason().map(str::to_string),
        rate_limit: RateLimitReport {
            allowed: outcome.rate_limit.allowed,
            count: outcome.rate_limit.count,
            remaining: outcome.rate_limit.remaining,
            reset_at: outcome.rate_limit.reset_at.to_rfc3339(),
        },
        policy: outcome.policy.as_ref().map(|policy| PolicyReport {
            allowed: policy.allowed,
            reason: policy.reason.clone(),
        }),
    }
}

/// OPTIONS /api/admission/status
pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}
