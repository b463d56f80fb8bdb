use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::cohort::{CohortResolver, CohortSource};
use super::domain::{Cohort, CohortContext, EnrollmentId, EnrollmentRecord, EnrollmentSubmission};
use super::duplicates::{DuplicateDetector, DuplicatePolicy};
use super::guard::{CollisionGuard, CommitOutcome};
use super::repository::{EnrollmentRepository, RepositoryError};
use super::sequence::SequenceResolver;

/// Terminal outcome of one allocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationResult {
    Allocated(EnrollmentRecord),
    /// The submitter already holds this identifier in the active cohort.
    Duplicate(EnrollmentId),
    /// The active cohort's sequence ran into identifiers issued to another cohort.
    CohortClosed {
        cohort: Cohort,
        identifier: EnrollmentId,
        claimed_by: Cohort,
    },
    /// The caller's cohort hint disagrees with the resolved cohort.
    ConfigMismatch { expected: String, provided: String },
    /// Retryable by resubmitting.
    TransientFailure(TransientCause),
}

impl AllocationResult {
    pub const fn label(&self) -> &'static str {
        match self {
            AllocationResult::Allocated(_) => "allocated",
            AllocationResult::Duplicate(_) => "duplicate",
            AllocationResult::CohortClosed { .. } => "cohort_closed",
            AllocationResult::ConfigMismatch { .. } => "config_mismatch",
            AllocationResult::TransientFailure(_) => "transient_failure",
        }
    }

    pub fn enrollment_id(&self) -> Option<&EnrollmentId> {
        match self {
            AllocationResult::Allocated(record) => Some(&record.enrollment_id),
            AllocationResult::Duplicate(identifier) => Some(identifier),
            _ => None,
        }
    }
}

/// Why an attempt ended as a transient failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransientCause {
    #[error("duplicate check failed: {0}")]
    DuplicateCheck(RepositoryError),
    #[error("sequence lookup failed: {0}")]
    Sequence(RepositoryError),
    #[error("commit failed: {0}")]
    Commit(RepositoryError),
    #[error("identifier {identifier} was taken concurrently twice")]
    RaceExhausted { identifier: EnrollmentId },
    #[error("allocation did not finish in time")]
    TimedOut,
    #[error("allocation worker stopped: {0}")]
    Aborted(String),
}

/// Orchestrates cohort resolution, duplicate detection, sequencing, and the guarded
/// commit. Holds no sequence state of its own; the store is the only shared resource,
/// so any number of attempts may run concurrently.
pub struct EnrollmentAllocator<R, S> {
    repository: Arc<R>,
    cohorts: CohortResolver<S>,
    duplicates: DuplicateDetector,
    sequence: SequenceResolver,
    guard: CollisionGuard,
}

impl<R, S> EnrollmentAllocator<R, S>
where
    R: EnrollmentRepository + 'static,
    S: CohortSource + 'static,
{
    pub fn new(
        repository: Arc<R>,
        source: Arc<S>,
        fallback: CohortContext,
        policy: DuplicatePolicy,
    ) -> Self {
        Self {
            repository,
            cohorts: CohortResolver::new(source, fallback),
            duplicates: DuplicateDetector::new(policy),
            sequence: SequenceResolver::new(),
            guard: CollisionGuard::new(),
        }
    }

    pub fn active_cohort(&self) -> CohortContext {
        self.cohorts.resolve()
    }

    /// Allocate using today's UTC date for the year prefix, so every instance agrees.
    pub fn allocate(&self, submission: EnrollmentSubmission) -> AllocationResult {
        self.allocate_on(submission, Utc::now().date_naive())
    }

    /// Single pass through the pipeline; `today` supplies the year prefix.
    pub fn allocate_on(&self, submission: EnrollmentSubmission, today: NaiveDate) -> AllocationResult {
        let context = self.cohorts.resolve();
        let cohort = &context.cohort;

        let provided = submission.cohort_number.trim();
        let expected = cohort.number.trim();
        if provided != expected {
            warn!(%cohort, provided, "cohort hint does not match active cohort");
            return AllocationResult::ConfigMismatch {
                expected: expected.to_string(),
                provided: provided.to_string(),
            };
        }

        let email = submission.email.trim().to_string();
        let repository = self.repository.as_ref();

        match self.duplicates.find_existing(repository, cohort, &email) {
            Ok(Some(existing)) => {
                info!(%cohort, enrollment_id = %existing, "submitter already enrolled");
                return AllocationResult::Duplicate(existing);
            }
            Ok(None) => {}
            Err(err) => return AllocationResult::TransientFailure(TransientCause::DuplicateCheck(err)),
        }

        let candidate = match self.sequence.next_candidate(repository, &context, today) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(error = %err, %cohort, "unable to compute enrollment candidate");
                return AllocationResult::TransientFailure(TransientCause::Sequence(err));
            }
        };

        let draft = EnrollmentRecord {
            enrollment_id: candidate.identifier(),
            email,
            cohort: cohort.clone(),
            payload: submission.payload,
            submitted_at: Utc::now(),
        };

        match self.guard.commit_or_reject(repository, candidate, draft) {
            CommitOutcome::Allocated(record) => {
                info!(
                    %cohort,
                    enrollment_id = %record.enrollment_id,
                    "enrollment identifier allocated"
                );
                AllocationResult::Allocated(record)
            }
            CommitOutcome::CohortClosed {
                identifier,
                claimed_by,
            } => AllocationResult::CohortClosed {
                cohort: cohort.clone(),
                identifier,
                claimed_by,
            },
            CommitOutcome::RaceExhausted { identifier } => {
                AllocationResult::TransientFailure(TransientCause::RaceExhausted { identifier })
            }
            CommitOutcome::StoreFailure(err) => {
                AllocationResult::TransientFailure(TransientCause::Commit(err))
            }
        }
    }
}
