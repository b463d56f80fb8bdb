use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use super::allocator::AllocationResult;
use super::cohort::CohortSource;
use super::domain::{Cohort, EnrollmentId, EnrollmentSubmission};
use super::flags::{ReceiptKind, SubmissionFlags};
use super::repository::EnrollmentRepository;
use super::service::{OnboardingService, SubmissionOutcome};

/// Header carrying the client's idempotency token.
pub const SUBMISSION_TOKEN_HEADER: &str = "x-submission-token";

/// Router builder exposing the enrollment endpoints.
pub fn onboarding_router<R, S, F>(service: Arc<OnboardingService<R, S, F>>) -> Router
where
    R: EnrollmentRepository + 'static,
    S: CohortSource + 'static,
    F: SubmissionFlags + 'static,
{
    Router::new()
        .route(
            "/api/v1/onboarding/enrollments",
            post(enroll_handler::<R, S, F>),
        )
        .route("/api/v1/onboarding/cohort", get(cohort_handler::<R, S, F>))
        .with_state(service)
}

/// Client-facing rendering of a submission outcome.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentView {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<EnrollmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort: Option<Cohort>,
    pub replayed: bool,
}

pub(crate) async fn enroll_handler<R, S, F>(
    State(service): State<Arc<OnboardingService<R, S, F>>>,
    headers: HeaderMap,
    Json(submission): Json<EnrollmentSubmission>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    S: CohortSource + 'static,
    F: SubmissionFlags + 'static,
{
    let token = headers
        .get(SUBMISSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match service.submit_bounded(token, submission).await {
        SubmissionOutcome::Replayed(receipt) => {
            let (status, outcome) = match receipt.kind {
                ReceiptKind::Allocated => (StatusCode::OK, "allocated"),
                ReceiptKind::Duplicate => (StatusCode::CONFLICT, "duplicate"),
            };
            let view = EnrollmentView {
                outcome,
                enrollment_id: Some(receipt.enrollment_id),
                cohort: None,
                replayed: true,
            };
            (status, Json(view)).into_response()
        }
        SubmissionOutcome::Decided(result) => allocation_response(result),
    }
}

fn allocation_response(result: AllocationResult) -> Response {
    let outcome = result.label();
    match result {
        AllocationResult::Allocated(record) => {
            let view = EnrollmentView {
                outcome,
                enrollment_id: Some(record.enrollment_id),
                cohort: Some(record.cohort),
                replayed: false,
            };
            (StatusCode::CREATED, Json(view)).into_response()
        }
        AllocationResult::Duplicate(enrollment_id) => {
            let view = EnrollmentView {
                outcome,
                enrollment_id: Some(enrollment_id),
                cohort: None,
                replayed: false,
            };
            (StatusCode::CONFLICT, Json(view)).into_response()
        }
        AllocationResult::CohortClosed { cohort, .. } => {
            let payload = json!({
                "outcome": outcome,
                "cohort": cohort,
                "error": "the enrollment period for this cohort has ended",
            });
            (StatusCode::GONE, Json(payload)).into_response()
        }
        AllocationResult::ConfigMismatch { expected, provided } => {
            let payload = json!({
                "outcome": outcome,
                "expected": expected,
                "provided": provided,
                "error": "cohort number does not match the active cohort",
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        AllocationResult::TransientFailure(cause) => {
            let payload = json!({
                "outcome": outcome,
                "error": cause.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn cohort_handler<R, S, F>(
    State(service): State<Arc<OnboardingService<R, S, F>>>,
) -> Response
where
    R: EnrollmentRepository + 'static,
    S: CohortSource + 'static,
    F: SubmissionFlags + 'static,
{
    (StatusCode::OK, Json(service.active_cohort())).into_response()
}
