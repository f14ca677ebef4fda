//! Admission middleware - runs every non-public request through the pipeline.

use actix_web::{
    Error, HttpMessage, HttpRequest, HttpResponse, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;

use warden_core::domain::{InboundRequest, RateLimitDecision};
use warden_core::services::{AdmissionOutcome, Verdict};

use crate::middleware::error::AppError;
use crate::observability::RequestId;
use crate::state::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Admission middleware factory.
pub struct AdmissionMiddleware {
    state: AppState,
}

impl AdmissionMiddleware {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AdmissionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdmissionMiddlewareService {
            service: Rc::new(service),
            state: self.state.clone(),
        }))
    }
}

pub struct AdmissionMiddlewareService<S> {
    service: Rc<S>,
    state: AppState,
}

impl<S, B> Service<ServiceRequest> for AdmissionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.state.is_public(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let service = Rc::clone(&self.service);
        let state = self.state.clone();

        Box::pin(async move {
            let inbound = inbound_request(req.request());
            let outcome = state.pipeline.admit(&inbound).await;
            let limit = state.pipeline.limiter().settings().max_requests();

            if let Some(identity) = outcome.identity() {
                req.extensions_mut().insert(identity.clone());

                let mut res = service.call(req).await?;
                for (name, value) in rate_limit_headers(limit, &outcome.rate_limit) {
                    res.headers_mut().insert(name, value);
                }
                return Ok(res.map_into_left_body());
            }

            let metadata_url = {
                let info = req.connection_info();
                format!(
                    "{}://{}/.well-known/oauth-protected-resource",
                    info.scheme(),
                    info.host()
                )
            };
            let request_id = req.extensions().get::<RequestId>().cloned();
            let response = rejection(&outcome, limit, &metadata_url, request_id);

            let (http_req, _payload) = req.into_parts();
            Ok(ServiceResponse::new(http_req, response).map_into_right_body())
        })
    }
}

/// Framework-neutral copy of the parts of a request the pipeline reads.
/// Header values that are not visible ASCII are skipped.
pub fn inbound_request(req: &HttpRequest) -> InboundRequest {
    let mut inbound = InboundRequest::new(req.method().as_str(), req.path());
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            inbound.insert_header(name.as_str(), value);
        }
    }

    match req.peer_addr() {
        Some(addr) => inbound.with_peer_addr(addr.ip().to_string()),
        None => inbound,
    }
}

fn rate_limit_headers(limit: u32, decision: &RateLimitDecision) -> [(HeaderName, HeaderValue); 3] {
    [
        (
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(limit),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(decision.remaining),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(decision.reset_at.timestamp()),
        ),
    ]
}

fn rejection(
    outcome: &AdmissionOutcome,
    limit: u32,
    metadata_url: &str,
    request_id: Option<RequestId>,
) -> HttpResponse {
    match &outcome.verdict {
        Verdict::RateLimited => {
            let retry_after = outcome.rate_limit.retry_after_secs(chrono::Utc::now());
            let mut builder = HttpResponse::TooManyRequests();
            for pair in rate_limit_headers(limit, &outcome.rate_limit) {
                builder.insert_header(pair);
            }
            builder
                .insert_header((header::RETRY_AFTER, retry_after))
                .content_type(TEXT_PLAIN)
                .body(outcome.body())
        }
        Verdict::PolicyDenied(_) => HttpResponse::Forbidden()
            .content_type(TEXT_PLAIN)
            .body(outcome.body()),
        Verdict::AuthRejected(err) => {
            let error = AppError::from(err.clone());
            let mut problem = error.problem();
            if let Some(id) = request_id {
                problem = problem.with_request_id(id.as_str());
            }

            let mut builder = HttpResponse::build(error.status_code());
            if outcome.status() == 401 {
                builder.insert_header((
                    header::WWW_AUTHENTICATE,
                    format!("Bearer resource_metadata=\"{}\"", metadata_url),
                ));
            }
            builder.json(problem)
        }
        Verdict::Admitted(_) => {
            AppError::Internal("Admitted request reached rejection path".to_string())
                .error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use warden_core::domain::IdentityContext;
    use warden_core::ports::{AuthError, AuthGate};
    use warden_infra::{JwtAuthGate, JwtConfig, RateLimitConfig};
    use warden_shared::ErrorResponse;
    use warden_shared::dto::IdentityResponse;

    use crate::config::{AppConfig, DEFAULT_PUBLIC_PATHS};
    use crate::handlers;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: 1,
            issuer: "warden-test".to_string(),
            required_role: None,
        }
    }

    fn test_config(max_requests: u32) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: RateLimitConfig {
                max_requests,
                window: Duration::from_secs(60),
                max_keys: 1_000,
            },
            #[cfg(feature = "oracle")]
            oracle: None,
            jwt: jwt_config(),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            resource_url: "http://localhost:8080/api".to_string(),
            authorization_servers: Vec::new(),
        }
    }

    fn token(subject: &str) -> String {
        JwtAuthGate::new(jwt_config())
            .issue_token(subject, Some("dev@example.com"), vec!["user".to_string()])
            .unwrap()
    }

    struct CountingGate {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthGate for CountingGate {
        async fn verify(&self, _request: &InboundRequest) -> Result<IdentityContext, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(IdentityContext::new("counted"))
        }
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .wrap(AdmissionMiddleware::new($state.clone()))
                    .app_data(web::Data::new($state.clone()))
                    .configure(handlers::configure_routes),
            )
            .await
        };
    }

    fn me_from(ip: &str, bearer: &str) -> test::TestRequest {
        test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("x-forwarded-for", ip))
            .insert_header(("authorization", format!("Bearer {}", bearer)))
    }

    #[actix_web::test]
    async fn test_third_request_is_rate_limited() {
        let state = AppState::new(&test_config(2)).unwrap();
        let app = app!(state);
        let bearer = token("user_1");

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let res = test::call_service(&app, me_from("1.2.3.4", &bearer).to_request()).await;
            statuses.push(res.status());
        }
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );

        let res = test::call_service(&app, me_from("1.2.3.4", &bearer).to_request()).await;
        assert!(res.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "0");
        let body = test::read_body(res).await;
        assert_eq!(body, AdmissionOutcome::RATE_LIMITED_BODY);
    }

    #[actix_web::test]
    async fn test_admitted_request_carries_identity_and_headers() {
        let state = AppState::new(&test_config(5)).unwrap();
        let app = app!(state);

        let res = test::call_service(&app, me_from("1.2.3.4", &token("user_123")).to_request()).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "5");
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "4");
        let body: IdentityResponse = test::read_body_json(res).await;
        assert_eq!(body.subject, "user_123");
        assert_eq!(body.email.as_deref(), Some("dev@example.com"));
    }

    #[actix_web::test]
    async fn test_unconfigured_oracle_falls_through_to_gate() {
        let state = AppState::new(&test_config(5)).unwrap();
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("x-forwarded-for", "1.2.3.4"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let challenge = res
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(challenge.contains("/.well-known/oauth-protected-resource"));
        let problem: ErrorResponse = test::read_body_json(res).await;
        assert_eq!(problem.status, 401);
    }

    #[actix_web::test]
    async fn test_clients_are_limited_independently() {
        let state = AppState::new(&test_config(1)).unwrap();
        let app = app!(state);
        let bearer = token("user_1");

        let first = test::call_service(&app, me_from("1.1.1.1", &bearer).to_request()).await;
        let second = test::call_service(&app, me_from("2.2.2.2", &bearer).to_request()).await;
        let again = test::call_service(&app, me_from("1.1.1.1", &bearer).to_request()).await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn test_public_paths_bypass_admission() {
        let state = AppState::new(&test_config(1)).unwrap();
        let app = app!(state);

        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri("/api/health")
                .insert_header(("x-forwarded-for", "1.2.3.4"))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri("/.well-known/oauth-protected-resource/mcp")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        assert!(state.pipeline.limiter().store().is_empty());
    }

    #[actix_web::test]
    async fn test_identity_missing_on_unprotected_route_is_500() {
        let mut config = test_config(5);
        config.public_paths.push("/api/me".to_string());
        let state = AppState::new(&config).unwrap();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/me").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[cfg(feature = "oracle")]
    mod oracle {
        use super::*;
        use serde_json::json;
        use warden_infra::OracleConfig;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn with_oracle(endpoint: String) -> AppConfig {
            let mut config = test_config(5);
            config.oracle = Some(OracleConfig {
                endpoint,
                timeout: Duration::from_millis(300),
                ..OracleConfig::new("test-key")
            });
            config
        }

        #[actix_web::test]
        async fn test_oracle_block_is_403_without_gate() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "action": "block" })))
                .mount(&server)
                .await;

            let gate = Arc::new(CountingGate {
                calls: AtomicUsize::new(0),
            });
            let state = AppState::with_gate(&with_oracle(server.uri()), gate.clone()).unwrap();
            let app = app!(state);

            let res = test::call_service(&app, me_from("1.2.3.4", "irrelevant").to_request()).await;

            assert_eq!(res.status(), StatusCode::FORBIDDEN);
            assert_eq!(gate.calls.load(Ordering::SeqCst), 0);
            let body = test::read_body(res).await;
            assert_eq!(body, AdmissionOutcome::POLICY_DENIED_BODY);
        }

        #[actix_web::test]
        async fn test_oracle_allow_reaches_handler() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowed": true })))
                .expect(1)
                .mount(&server)
                .await;

            let state = AppState::new(&with_oracle(server.uri())).unwrap();
            let app = app!(state);

            let res = test::call_service(&app, me_from("1.2.3.4", &token("user_9")).to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        #[actix_web::test]
        async fn test_unreachable_oracle_fails_open() {
            let state = AppState::new(&with_oracle("http://127.0.0.1:1/v1/decide".to_string())).unwrap();
            assert!(state.pipeline.oracle().is_configured());
            let app = app!(state);

            let res = test::call_service(&app, me_from("1.2.3.4", &token("user_9")).to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
