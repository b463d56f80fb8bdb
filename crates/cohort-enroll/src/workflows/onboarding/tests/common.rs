use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::workflows::onboarding::cohort::{CohortSource, CohortSourceError, StaticCohortSource};
use crate::workflows::onboarding::domain::{
    ApplicantPayload, Cohort, CohortContext, EnrollmentId, EnrollmentRecord, EnrollmentSubmission,
};
use crate::workflows::onboarding::duplicates::DuplicatePolicy;
use crate::workflows::onboarding::flags::InMemorySubmissionFlags;
use crate::workflows::onboarding::memory::InMemoryEnrollmentRepository;
use crate::workflows::onboarding::repository::{
    EnrollmentRepository, RecordOrder, RecordQuery, RepositoryError,
};
use crate::workflows::onboarding::{EnrollmentAllocator, OnboardingService};

pub(super) fn placement() -> Cohort {
    Cohort::new("Placement", "2.0")
}

pub(super) fn basic() -> Cohort {
    Cohort::new("Basic", "1.0")
}

pub(super) fn placement_context() -> CohortContext {
    CohortContext::new(placement(), 2501)
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid date")
}

pub(super) fn payload(name: &str) -> ApplicantPayload {
    ApplicantPayload {
        full_name: name.to_string(),
        phone_number: "+91 98765 43210".to_string(),
        linkedin: Some(format!("https://linkedin.com/in/{}", name.to_lowercase())),
        github: None,
        hackerrank: None,
        college: "Regional Institute of Technology".to_string(),
        college_state: "Karnataka".to_string(),
        college_year: "3rd".to_string(),
        branch: "CSE".to_string(),
        graduation_year: "2027".to_string(),
        understanding: "Intermediate".to_string(),
        familiar_skills: vec!["Rust".to_string(), "SQL".to_string()],
        built_projects: "Inventory tracker".to_string(),
        goal: "Backend internship".to_string(),
    }
}

pub(super) fn submission(email: &str) -> EnrollmentSubmission {
    EnrollmentSubmission {
        cohort_number: "2.0".to_string(),
        email: email.to_string(),
        payload: payload("Asha"),
    }
}

pub(super) fn record(id: &str, email: &str, cohort: &Cohort) -> EnrollmentRecord {
    EnrollmentRecord {
        enrollment_id: EnrollmentId::from(id),
        email: email.to_string(),
        cohort: cohort.clone(),
        payload: ApplicantPayload::default(),
        submitted_at: Utc::now(),
    }
}

pub(super) fn allocator<R>(repository: Arc<R>) -> EnrollmentAllocator<R, StaticCohortSource>
where
    R: EnrollmentRepository + 'static,
{
    allocator_with_policy(repository, DuplicatePolicy::FailOpen)
}

pub(super) fn allocator_with_policy<R>(
    repository: Arc<R>,
    policy: DuplicatePolicy,
) -> EnrollmentAllocator<R, StaticCohortSource>
where
    R: EnrollmentRepository + 'static,
{
    EnrollmentAllocator::new(
        repository,
        Arc::new(StaticCohortSource::new(placement_context())),
        placement_context(),
        policy,
    )
}

pub(super) fn build_service() -> (
    OnboardingService<InMemoryEnrollmentRepository, StaticCohortSource, InMemorySubmissionFlags>,
    Arc<InMemoryEnrollmentRepository>,
    Arc<InMemorySubmissionFlags>,
) {
    let repository = Arc::new(InMemoryEnrollmentRepository::default());
    let flags = Arc::new(InMemorySubmissionFlags::default());
    let service = OnboardingService::new(
        Arc::new(allocator(repository.clone())),
        flags.clone(),
        Duration::from_secs(5),
    );
    (service, repository, flags)
}

/// Which reads or writes a [`FaultyRepository`] should fail.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Faults {
    pub(super) email_reads: bool,
    pub(super) sorted_reads: bool,
    pub(super) sorted_reads_rejected: bool,
    /// Fails only the ascending (lowest identifier) read.
    pub(super) low_water_reads: bool,
    pub(super) cohort_scans: bool,
    pub(super) identifier_reads: bool,
    pub(super) inserts: bool,
    /// Sorted reads skip this many of the newest rows, like a lagging replica.
    pub(super) sorted_lag: usize,
}

/// In-memory store wrapper that injects failures by query shape.
#[derive(Default)]
pub(super) struct FaultyRepository {
    pub(super) inner: InMemoryEnrollmentRepository,
    pub(super) faults: Faults,
}

impl FaultyRepository {
    pub(super) fn new(inner: InMemoryEnrollmentRepository, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl EnrollmentRepository for FaultyRepository {
    fn select(&self, query: &RecordQuery) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        let faults = self.faults;
        if query.email.is_some() && faults.email_reads {
            return Err(offline());
        }
        if query.identifier.is_some() && faults.identifier_reads {
            return Err(offline());
        }
        if query.order.is_some() {
            if query.order == Some(RecordOrder::IdentifierAscending) && faults.low_water_reads {
                return Err(offline());
            }
            if faults.sorted_reads_rejected {
                return Err(RepositoryError::UnsupportedQuery(
                    "order by \"EnrollmentID\" not permitted".to_string(),
                ));
            }
            if faults.sorted_reads {
                return Err(offline());
            }
            if faults.sorted_lag > 0 {
                let unlimited = RecordQuery {
                    limit: None,
                    ..query.clone()
                };
                let mut rows = self.inner.select(&unlimited)?;
                rows.drain(..faults.sorted_lag.min(rows.len()));
                if let Some(limit) = query.limit {
                    rows.truncate(limit);
                }
                return Ok(rows);
            }
        } else if query.email.is_none() && query.identifier.is_none() && faults.cohort_scans {
            return Err(offline());
        }

        self.inner.select(query)
    }

    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError> {
        if self.faults.inserts {
            return Err(offline());
        }
        self.inner.insert(record)
    }
}

/// Store where a rival writer commits the same identifier just before each of our
/// inserts, after the collision guard's lookup has already passed.
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryEnrollmentRepository,
    rivals: Mutex<VecDeque<Cohort>>,
}

impl RacingRepository {
    pub(super) fn new(rivals: Vec<Cohort>) -> Self {
        Self {
            inner: InMemoryEnrollmentRepository::default(),
            rivals: Mutex::new(rivals.into()),
        }
    }
}

impl EnrollmentRepository for RacingRepository {
    fn select(&self, query: &RecordQuery) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        self.inner.select(query)
    }

    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError> {
        let rival = self.rivals.lock().expect("rival mutex poisoned").pop_front();
        if let Some(cohort) = rival {
            let mut winner = record.clone();
            winner.email = format!("rival-{}@example.com", record.enrollment_id);
            winner.cohort = cohort;
            self.inner.insert(winner)?;
        }
        self.inner.insert(record)
    }
}

/// Store whose reads stall longer than any sensible allocation budget.
pub(super) struct StalledRepository {
    pub(super) delay: Duration,
}

impl EnrollmentRepository for StalledRepository {
    fn select(&self, _query: &RecordQuery) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        std::thread::sleep(self.delay);
        Ok(Vec::new())
    }

    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError> {
        Ok(record)
    }
}

pub(super) struct OfflineCohortSource;

impl CohortSource for OfflineCohortSource {
    fn active_cohort(&self) -> Result<CohortContext, CohortSourceError> {
        Err(CohortSourceError::Unavailable(
            "enrollment_config unreachable".to_string(),
        ))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
