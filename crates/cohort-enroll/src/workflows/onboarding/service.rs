use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use super::allocator::{AllocationResult, EnrollmentAllocator, TransientCause};
use super::cohort::CohortSource;
use super::domain::{CohortContext, EnrollmentSubmission};
use super::flags::{ReceiptKind, SubmissionFlags, SubmissionReceipt};
use super::repository::EnrollmentRepository;

/// What the service did with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The client token already carried a terminal receipt; the allocator was not invoked.
    Replayed(SubmissionReceipt),
    Decided(AllocationResult),
}

/// Service composing the allocator with the client submission flags and the
/// per-attempt time budget.
pub struct OnboardingService<R, S, F> {
    allocator: Arc<EnrollmentAllocator<R, S>>,
    flags: Arc<F>,
    store_timeout: Duration,
}

impl<R, S, F> OnboardingService<R, S, F>
where
    R: EnrollmentRepository + 'static,
    S: CohortSource + 'static,
    F: SubmissionFlags + 'static,
{
    pub fn new(
        allocator: Arc<EnrollmentAllocator<R, S>>,
        flags: Arc<F>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            allocator,
            flags,
            store_timeout,
        }
    }

    pub fn active_cohort(&self) -> CohortContext {
        self.allocator.active_cohort()
    }

    pub fn submit(&self, token: Option<&str>, submission: EnrollmentSubmission) -> SubmissionOutcome {
        self.submit_on(token, submission, Utc::now().date_naive())
    }

    pub fn submit_on(
        &self,
        token: Option<&str>,
        submission: EnrollmentSubmission,
        today: NaiveDate,
    ) -> SubmissionOutcome {
        let token = token.map(str::trim).filter(|token| !token.is_empty());

        if let Some(token) = token {
            match self.flags.get(token) {
                Ok(Some(receipt)) => {
                    debug!(enrollment_id = %receipt.enrollment_id, "replaying submission receipt");
                    return SubmissionOutcome::Replayed(receipt);
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "submission flag lookup failed, ignoring"),
            }
        }

        let result = self.allocator.allocate_on(submission, today);

        if let Some(token) = token {
            let kind = match &result {
                AllocationResult::Allocated(_) => Some(ReceiptKind::Allocated),
                AllocationResult::Duplicate(_) => Some(ReceiptKind::Duplicate),
                _ => None,
            };
            if let (Some(kind), Some(enrollment_id)) = (kind, result.enrollment_id()) {
                let receipt = SubmissionReceipt {
                    enrollment_id: enrollment_id.clone(),
                    kind,
                    recorded_at: Utc::now(),
                };
                if let Err(err) = self.flags.set(token, receipt) {
                    warn!(error = %err, "unable to record submission flag");
                }
            }
        }

        SubmissionOutcome::Decided(result)
    }

    /// Run [`Self::submit`] on the blocking pool, bounded by the store timeout.
    ///
    /// An attempt that overruns resolves to `TransientFailure(TimedOut)`, but the
    /// worker is not cancelled: it may still commit the record and set the
    /// submission flag after the caller has seen the failure. A resubmission then
    /// reports `Duplicate`, or replays the receipt when it carries the same token.
    pub async fn submit_bounded(
        self: Arc<Self>,
        token: Option<String>,
        submission: EnrollmentSubmission,
    ) -> SubmissionOutcome {
        let budget = self.store_timeout;
        let service = Arc::clone(&self);
        let task =
            tokio::task::spawn_blocking(move || service.submit(token.as_deref(), submission));

        match tokio::time::timeout(budget, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => {
                warn!(error = %join_error, "allocation worker failed");
                SubmissionOutcome::Decided(AllocationResult::TransientFailure(
                    TransientCause::Aborted(join_error.to_string()),
                ))
            }
            Err(_) => {
                warn!(timeout_ms = budget.as_millis() as u64, "allocation timed out");
                SubmissionOutcome::Decided(AllocationResult::TransientFailure(
                    TransientCause::TimedOut,
                ))
            }
        }
    }
}
