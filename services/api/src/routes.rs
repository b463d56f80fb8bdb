use crate::infra::{AppService, AppState};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Extension;
use axum::Json;
use cohort_enroll::workflows::onboarding::{onboarding_router, CohortContext};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub(crate) struct PublishedCohort {
    pub(crate) status: &'static str,
    pub(crate) active: CohortContext,
}

pub(crate) fn with_onboarding_routes(service: Arc<AppService>) -> axum::Router {
    onboarding_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/admin/cohort", put(publish_cohort_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Operator switch for the active cohort. Submissions still carrying the old
/// cohort number are rejected as stale from this point on.
pub(crate) async fn publish_cohort_endpoint(
    Extension(state): Extension<AppState>,
    Json(context): Json<CohortContext>,
) -> Response {
    if context.cohort.cohort_type.trim().is_empty() || context.cohort.number.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "cohort type and number are required" })),
        )
            .into_response();
    }
    if context.starting_number == 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "starting number must be positive" })),
        )
            .into_response();
    }

    let context = state.cohorts.publish(context);
    info!(
        cohort = %context.cohort,
        starting_number = context.starting_number,
        "active cohort published"
    );

    (
        StatusCode::OK,
        Json(PublishedCohort {
            status: "published",
            active: context,
        }),
    )
        .into_response()
}
