use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Literal marker separating the year prefix from the numeric suffix (`25MBY2501`).
pub const IDENTIFIER_MARKER: &str = "MBY";

/// Minimum width of the zero-padded numeric suffix. Wider suffixes are never truncated.
pub const SUFFIX_WIDTH: usize = 4;

/// Enrollment period. Equality is exact on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cohort {
    pub cohort_type: String,
    pub number: String,
}

impl Cohort {
    pub fn new(cohort_type: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            cohort_type: cohort_type.into(),
            number: number.into(),
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.cohort_type, self.number)
    }
}

/// Active cohort plus the suffix its sequence starts from, captured once per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortContext {
    pub cohort: Cohort,
    pub starting_number: u32,
}

impl CohortContext {
    pub fn new(cohort: Cohort, starting_number: u32) -> Self {
        Self {
            cohort,
            starting_number,
        }
    }
}

/// Human-readable enrollment identifier, e.g. `25MBY2501`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub String);

impl EnrollmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric tail of the identifier. `None` when the identifier does not end in
    /// digits or the digits overflow.
    pub fn suffix(&self) -> Option<u32> {
        let digits_start = self
            .0
            .char_indices()
            .rev()
            .take_while(|(_, ch)| ch.is_ascii_digit())
            .last()
            .map(|(index, _)| index)?;

        self.0[digits_start..].parse().ok()
    }

    /// Two-digit year prefix of a well-formed `<YY>MBY<digits>` identifier.
    pub fn year_prefix(&self) -> Option<&str> {
        let year = self.0.get(..2)?;
        let digits = self.0.get(2..)?.strip_prefix(IDENTIFIER_MARKER)?;
        let numeric = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        (numeric(year) && numeric(digits)).then_some(year)
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EnrollmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier under consideration before commit: a year prefix and the ordered suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentCandidate {
    year: u32,
    suffix: u32,
}

impl EnrollmentCandidate {
    pub fn new(today: NaiveDate, suffix: u32) -> Self {
        Self {
            year: today.year().rem_euclid(100) as u32,
            suffix,
        }
    }

    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    /// The same year prefix with the suffix bumped by one.
    pub fn next(self) -> Self {
        Self {
            suffix: self.suffix.saturating_add(1),
            ..self
        }
    }

    pub fn identifier(&self) -> EnrollmentId {
        EnrollmentId(format!(
            "{:02}{}{:0width$}",
            self.year,
            IDENTIFIER_MARKER,
            self.suffix,
            width = SUFFIX_WIDTH
        ))
    }
}

/// Applicant-provided intake fields. Opaque to allocation; stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantPayload {
    pub full_name: String,
    pub phone_number: String,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub hackerrank: Option<String>,
    pub college: String,
    pub college_state: String,
    pub college_year: String,
    pub branch: String,
    pub graduation_year: String,
    pub understanding: String,
    pub familiar_skills: Vec<String>,
    pub built_projects: String,
    pub goal: String,
}

/// Inbound request for an identifier. `cohort_number` is the cohort the caller
/// believes is active and only serves to detect configuration drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSubmission {
    pub cohort_number: String,
    pub email: String,
    #[serde(default)]
    pub payload: ApplicantPayload,
}

/// Accepted submission. Written once, never mutated or deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub enrollment_id: EnrollmentId,
    pub email: String,
    pub cohort: Cohort,
    pub payload: ApplicantPayload,
    pub submitted_at: DateTime<Utc>,
}
