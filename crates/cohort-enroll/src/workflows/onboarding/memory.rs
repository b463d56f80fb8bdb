use std::sync::{Arc, Mutex};

use super::domain::EnrollmentRecord;
use super::repository::{EnrollmentRepository, RecordOrder, RecordQuery, RepositoryError};

/// Process-local enrollment table used by the demo, the API service, and tests.
///
/// Unordered reads return records in insertion order. The identifier column carries
/// a uniqueness constraint, matching what a production table should declare.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEnrollmentRepository {
    records: Arc<Mutex<Vec<EnrollmentRecord>>>,
}

impl InMemoryEnrollmentRepository {
    pub fn with_records(records: Vec<EnrollmentRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub fn records(&self) -> Vec<EnrollmentRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EnrollmentRecord>> {
        // A panic while holding the lock cannot leave a half-written row behind.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EnrollmentRepository for InMemoryEnrollmentRepository {
    fn select(&self, query: &RecordQuery) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        let guard = self.lock();
        let mut rows: Vec<EnrollmentRecord> = guard
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        drop(guard);

        match query.order {
            Some(RecordOrder::IdentifierDescending) => {
                rows.sort_by(|a, b| b.enrollment_id.cmp(&a.enrollment_id))
            }
            Some(RecordOrder::IdentifierAscending) => {
                rows.sort_by(|a, b| a.enrollment_id.cmp(&b.enrollment_id))
            }
            None => {}
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    fn insert(&self, record: EnrollmentRecord) -> Result<EnrollmentRecord, RepositoryError> {
        let mut guard = self.lock();
        if guard
            .iter()
            .any(|existing| existing.enrollment_id == record.enrollment_id)
        {
            return Err(RepositoryError::Conflict {
                identifier: record.enrollment_id,
            });
        }
        guard.push(record.clone());
        Ok(record)
    }
}
