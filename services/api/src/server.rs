use crate::cli::ServeArgs;
use crate::infra::{in_memory_engine, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use interview_booking::config::AppConfig;
use interview_booking::error::AppError;
use interview_booking::scheduling::{SchedulingError, SystemClock};
use interview_booking::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let infra = in_memory_engine(
        &args.jobs,
        Arc::new(SystemClock),
        config.scheduling.clone(),
    )
    .map_err(SchedulingError::from)?;

    let app = with_service_routes(infra.engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        jobs = args.jobs.len(),
        "interview booking service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
