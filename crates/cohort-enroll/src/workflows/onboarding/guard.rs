use tracing::{error, warn};

use super::domain::{Cohort, EnrollmentCandidate, EnrollmentId, EnrollmentRecord};
use super::repository::{EnrollmentRepository, RecordQuery, RepositoryError};

/// Same-cohort collisions tolerated per attempt before giving up.
pub const MAX_RACE_RETRIES: u8 = 1;

/// Result of trying to commit a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Allocated(EnrollmentRecord),
    /// The identifier belongs to a different cohort: the active cohort is no longer
    /// the allocation frontier.
    CohortClosed {
        identifier: EnrollmentId,
        claimed_by: Cohort,
    },
    /// Lost the race for a suffix more often than [`MAX_RACE_RETRIES`] allows.
    RaceExhausted { identifier: EnrollmentId },
    StoreFailure(RepositoryError),
}

enum Collision {
    SameCohort,
    OtherCohort(Cohort),
}

enum Attempt {
    Committed(EnrollmentRecord),
    Collided(Collision),
}

/// Re-validates a candidate right before insert and classifies collisions.
///
/// The lookup ahead of the insert is advisory. The store's uniqueness constraint on
/// the identifier is what actually prevents duplicates, so a `Conflict` from
/// `insert` is handled exactly like a collision seen during the lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionGuard;

impl CollisionGuard {
    pub fn new() -> Self {
        Self
    }

    /// Commit `draft` under `candidate`, bumping the suffix once on a same-cohort race.
    /// `draft.enrollment_id` is overwritten.
    pub fn commit_or_reject<R>(
        &self,
        repository: &R,
        candidate: EnrollmentCandidate,
        draft: EnrollmentRecord,
    ) -> CommitOutcome
    where
        R: EnrollmentRepository + ?Sized,
    {
        let mut candidate = candidate;
        let mut retries = 0;

        loop {
            let identifier = candidate.identifier();
            let mut record = draft.clone();
            record.enrollment_id = identifier.clone();

            match self.attempt(repository, record) {
                Ok(Attempt::Committed(record)) => return CommitOutcome::Allocated(record),
                Ok(Attempt::Collided(Collision::OtherCohort(claimed_by))) => {
                    warn!(
                        %identifier,
                        cohort = %draft.cohort,
                        %claimed_by,
                        "candidate already issued to another cohort, cohort closed"
                    );
                    return CommitOutcome::CohortClosed {
                        identifier,
                        claimed_by,
                    };
                }
                Ok(Attempt::Collided(Collision::SameCohort)) => {
                    if retries >= MAX_RACE_RETRIES {
                        warn!(
                            %identifier,
                            cohort = %draft.cohort,
                            "lost the race for a suffix again, giving up"
                        );
                        return CommitOutcome::RaceExhausted { identifier };
                    }
                    retries += 1;
                    candidate = candidate.next();
                    warn!(
                        %identifier,
                        next = %candidate.identifier(),
                        cohort = %draft.cohort,
                        "lost the race for a suffix, retrying with the next one"
                    );
                }
                Err(err) => {
                    error!(error = %err, %identifier, cohort = %draft.cohort, "commit failed");
                    return CommitOutcome::StoreFailure(err);
                }
            }
        }
    }

    fn attempt<R>(&self, repository: &R, record: EnrollmentRecord) -> Result<Attempt, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        if let Some(collision) = self.lookup(repository, &record.enrollment_id, &record.cohort)? {
            return Ok(Attempt::Collided(collision));
        }

        let identifier = record.enrollment_id.clone();
        let cohort = record.cohort.clone();
        match repository.insert(record) {
            Ok(stored) => Ok(Attempt::Committed(stored)),
            Err(RepositoryError::Conflict { .. }) => {
                // Someone committed between the lookup and our insert. A conflicting row
                // that is not yet visible can only be a concurrent writer in our cohort.
                let collision = self
                    .lookup(repository, &identifier, &cohort)?
                    .unwrap_or(Collision::SameCohort);
                Ok(Attempt::Collided(collision))
            }
            Err(err) => Err(err),
        }
    }

    /// Cohort-agnostic lookup of `identifier`.
    fn lookup<R>(
        &self,
        repository: &R,
        identifier: &EnrollmentId,
        cohort: &Cohort,
    ) -> Result<Option<Collision>, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        let existing = repository.select(&RecordQuery::new().identifier(identifier).limit(1))?;

        Ok(existing.into_iter().next().map(|record| {
            if &record.cohort == cohort {
                Collision::SameCohort
            } else {
                Collision::OtherCohort(record.cohort)
            }
        }))
    }
}
