use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::domain::{Cohort, EnrollmentId};
use super::repository::{EnrollmentRepository, RecordQuery, RepositoryError};

/// How the duplicate check behaves when the store cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Log the failure and continue allocating. Trades a small risk of admitting a
    /// duplicate submitter for availability while the store is degraded.
    #[default]
    FailOpen,
    /// Abort the attempt as a transient failure.
    FailClosed,
}

impl DuplicatePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "fail_open" | "open" => Some(Self::FailOpen),
            "fail-closed" | "fail_closed" | "closed" => Some(Self::FailClosed),
            _ => None,
        }
    }
}

/// Finds an existing enrollment for a submitter within one exact cohort.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetector {
    policy: DuplicatePolicy,
}

impl DuplicateDetector {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    /// Returns the identifier already held by `email` in `cohort`, if any.
    ///
    /// Under [`DuplicatePolicy::FailOpen`] a store error is logged and reported as
    /// "no duplicate"; under [`DuplicatePolicy::FailClosed`] it is returned.
    pub fn find_existing<R>(
        &self,
        repository: &R,
        cohort: &Cohort,
        email: &str,
    ) -> Result<Option<EnrollmentId>, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        let query = RecordQuery::new().email(email).cohort(cohort);
        let matches = match repository.select(&query) {
            Ok(matches) => matches,
            Err(err) => {
                return match self.policy {
                    DuplicatePolicy::FailOpen => {
                        warn!(
                            error = %err,
                            %cohort,
                            "duplicate check failed, proceeding with allocation"
                        );
                        Ok(None)
                    }
                    DuplicatePolicy::FailClosed => {
                        error!(error = %err, %cohort, "duplicate check failed");
                        Err(err)
                    }
                };
            }
        };

        if matches.len() > 1 {
            let identifiers: Vec<&str> = matches
                .iter()
                .map(|record| record.enrollment_id.as_str())
                .collect();
            warn!(
                %cohort,
                count = matches.len(),
                ?identifiers,
                "submitter holds multiple enrollments in one cohort, using the first"
            );
        }

        Ok(matches
            .into_iter()
            .next()
            .map(|record| record.enrollment_id))
    }
}
