use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, OperatorCohortSource};
use crate::routes::with_onboarding_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use cohort_enroll::config::AppConfig;
use cohort_enroll::error::AppError;
use cohort_enroll::telemetry;
use cohort_enroll::workflows::onboarding::InMemoryEnrollmentRepository;
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

    let repository = Arc::new(InMemoryEnrollmentRepository::default());
    let cohorts = Arc::new(OperatorCohortSource::default());
    cohorts.publish(config.enrollment.fallback.clone());
    let service = build_service(&config.enrollment, repository, cohorts.clone());

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        cohorts,
    };

    let app = with_onboarding_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        cohort = %config.enrollment.fallback.cohort,
        starting_number = config.enrollment.fallback.starting_number,
        duplicate_policy = ?config.enrollment.duplicate_policy,
        "cohort enrollment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
