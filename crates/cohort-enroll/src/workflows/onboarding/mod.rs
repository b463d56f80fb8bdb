//! Enrollment identifier allocation for onboarding intake.
//!
//! Each accepted submission receives a `<YY>MBY<NNNN>` identifier sequenced per cohort.
//! The pipeline runs once per attempt: resolve the active cohort, reject known
//! submitters, derive the next candidate from the store's high-water mark, then commit
//! through the collision guard. The record store offers no atomic increment, so
//! concurrent attempts coordinate only through the guard's post-hoc collision checks
//! and the store's uniqueness constraint on identifiers.

pub mod allocator;
pub mod cohort;
pub mod domain;
pub mod duplicates;
pub mod flags;
pub mod guard;
pub mod memory;
pub mod repository;
pub mod router;
pub mod sequence;
pub mod service;

#[cfg(test)]
mod tests;

pub use allocator::{AllocationResult, EnrollmentAllocator, TransientCause};
pub use cohort::{CohortResolver, CohortSource, CohortSourceError, StaticCohortSource};
pub use domain::{
    ApplicantPayload, Cohort, CohortContext, EnrollmentCandidate, EnrollmentId, EnrollmentRecord,
    EnrollmentSubmission, IDENTIFIER_MARKER, SUFFIX_WIDTH,
};
pub use duplicates::{DuplicateDetector, DuplicatePolicy};
pub use flags::{
    FlagError, InMemorySubmissionFlags, ReceiptKind, SubmissionFlags, SubmissionReceipt,
};
pub use guard::{CollisionGuard, CommitOutcome, MAX_RACE_RETRIES};
pub use memory::InMemoryEnrollmentRepository;
pub use repository::{EnrollmentRepository, RecordOrder, RecordQuery, RepositoryError};
pub use router::{onboarding_router, EnrollmentView, SUBMISSION_TOKEN_HEADER};
pub use sequence::SequenceResolver;
pub use service::{OnboardingService, SubmissionOutcome};
