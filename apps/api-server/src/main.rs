//! # Warden API Server
//!
//! Actix-web host for the admission pipeline.

use actix_web::{App, HttpServer, middleware::from_fn, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::admission::AdmissionMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Warden API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config).context("Invalid rate limit configuration")?;

    #[cfg(feature = "scheduler")]
    let _scheduler = start_scheduler(&state).await;

    #[cfg(not(feature = "scheduler"))]
    tracing::info!("Running without scheduler - expired windows evicted only at capacity");

    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(AdmissionMiddleware::new(app_state.clone()))
            .wrap(from_fn(observability::request_id))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

/// Start the window sweep. A scheduler failure only costs eager eviction,
/// so it is logged rather than fatal.
#[cfg(feature = "scheduler")]
async fn start_scheduler(state: &AppState) -> Option<background::Scheduler> {
    use background::{Scheduler, SchedulerConfig};

    let result = async {
        let scheduler = Scheduler::new(SchedulerConfig::from_env()).await?;
        scheduler
            .add_window_sweep(state.pipeline.limiter().clone())
            .await?;
        scheduler.start().await?;
        Ok::<_, tokio_cron_scheduler::JobSchedulerError>(scheduler)
    }
    .await;

    match result {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start window sweep scheduler");
            None
        }
    }
}
