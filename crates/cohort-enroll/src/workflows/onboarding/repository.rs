use super::domain::{Cohort, EnrollmentId, EnrollmentRecord};

/// Ordering the store can apply server-side before limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    /// Identifier column, descending, compared as text.
    IdentifierDescending,
    /// Identifier column, ascending, compared as text.
    IdentifierAscending,
}

/// Filtered read over the enrollment table. Unset filters match every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub email: Option<String>,
    pub cohort: Option<Cohort>,
    pub identifier: Option<EnrollmentId>,
    pub order: Option<RecordOrder>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn cohort(mut self, cohort: &Cohort) -> Self {
        self.cohort = Some(cohort.clone());
        self
    }

    pub fn identifier(mut self, identifier: &EnrollmentId) -> Self {
        self.identifier = Some(identifier.clone());
        self
    }

    pub fn order(mut self, order: RecordOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &EnrollmentRecord) -> bool {
        self.email
            .as_deref()
            .map_or(true, |email| record.email == email)
            && self
                .cohort
                .as_ref()
                .map_or(true, |cohort| &record.cohort == cohort)
            && self
                .identifier
                .as_ref()
                .map_or(true, |identifier| &record.enrollment_id == identifier)
    }
}

/// Table-like record store. No atomic increment or multi-row transaction is assumed;
/// the only integrity guarantee relied upon is a uniqueness constraint on the
/// identifier column, surfaced as [`RepositoryError::Conflict`] from `insert`.
pub trait EnrollmentRepository: Send + Sync {
    fn select(&self, query: &RecordQuery) -> Result<Vec<EnrollmentRecord>, RepositoryError>;
    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("identifier {identifier} already exists")]
    Conflict { identifier: EnrollmentId },
    #[error("store rejected query: {0}")]
    UnsupportedQuery(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
