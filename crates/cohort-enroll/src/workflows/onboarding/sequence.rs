use chrono::NaiveDate;
use tracing::{debug, warn};

use super::domain::{Cohort, CohortContext, EnrollmentCandidate, EnrollmentId};
use super::repository::{EnrollmentRepository, RecordOrder, RecordQuery, RepositoryError};

/// Once the sorted read reports this suffix, wider suffixes may be hiding below it:
/// as text, `25MBY10000` sorts before `25MBY9999`.
const TEXT_ORDER_CEILING: u32 = 9_999;

/// Derives the next candidate identifier for a cohort from the store's high-water mark.
///
/// Read-only: two calls without an intervening commit yield the same candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceResolver;

impl SequenceResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn next_candidate<R>(
        &self,
        repository: &R,
        context: &CohortContext,
        today: NaiveDate,
    ) -> Result<EnrollmentCandidate, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        let suffix = match self.high_water_mark(repository, &context.cohort)? {
            Some(max) => max.saturating_add(1),
            None => context.starting_number,
        };

        let candidate = EnrollmentCandidate::new(today, suffix);
        debug!(
            cohort = %context.cohort,
            candidate = %candidate.identifier(),
            "computed enrollment candidate"
        );
        Ok(candidate)
    }

    /// Highest allocated suffix in the cohort, or `None` when nothing usable exists.
    ///
    /// The sorted read compares identifiers as text, so the year prefix dominates the
    /// suffix. Its top row is only trusted when the cohort's lowest and highest
    /// identifiers share one year prefix; otherwise the cohort is scanned numerically.
    pub fn high_water_mark<R>(
        &self,
        repository: &R,
        cohort: &Cohort,
    ) -> Result<Option<u32>, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        let top = match self.edge(repository, cohort, RecordOrder::IdentifierDescending) {
            Ok(None) => return Ok(None),
            Ok(Some(top)) => top,
            Err(err) => {
                warn!(error = %err, %cohort, "sorted high-water read failed, scanning cohort");
                return self.scan(repository, cohort);
            }
        };

        let trusted = match (top.year_prefix(), top.suffix()) {
            (Some(year), Some(suffix)) if suffix < TEXT_ORDER_CEILING => {
                match self.edge(repository, cohort, RecordOrder::IdentifierAscending) {
                    Ok(Some(bottom)) if bottom.year_prefix() == Some(year) => Some(suffix),
                    Ok(_) => None,
                    Err(err) => {
                        warn!(error = %err, %cohort, "sorted low-water read failed, scanning cohort");
                        None
                    }
                }
            }
            _ => None,
        };

        match trusted {
            Some(suffix) => Ok(Some(suffix)),
            None => {
                debug!(%cohort, %top, "sorted read not trustworthy, scanning cohort");
                self.scan(repository, cohort)
            }
        }
    }

    fn edge<R>(
        &self,
        repository: &R,
        cohort: &Cohort,
        order: RecordOrder,
    ) -> Result<Option<EnrollmentId>, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        let rows = repository.select(&RecordQuery::new().cohort(cohort).order(order).limit(1))?;
        Ok(rows.into_iter().next().map(|record| record.enrollment_id))
    }

    /// Client-side scan over every identifier in the cohort. Unparseable suffixes
    /// count as zero so they never win.
    fn scan<R>(&self, repository: &R, cohort: &Cohort) -> Result<Option<u32>, RepositoryError>
    where
        R: EnrollmentRepository + ?Sized,
    {
        let rows = repository.select(&RecordQuery::new().cohort(cohort))?;
        let max = rows
            .iter()
            .map(|record| record.enrollment_id.suffix().unwrap_or(0))
            .max();

        Ok(max.filter(|suffix| *suffix > 0))
    }
}
