use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::EnrollmentId;

/// Which terminal outcome a client token was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Allocated,
    Duplicate,
}

/// What a client learned the last time it submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub enrollment_id: EnrollmentId,
    pub kind: ReceiptKind,
    pub recorded_at: DateTime<Utc>,
}

/// Per-client submission flag, consulted before allocating so a repeat attempt from
/// the same client short-circuits. Best effort only: it is easily cleared and plays
/// no part in uniqueness.
pub trait SubmissionFlags: Send + Sync {
    fn get(&self, token: &str) -> Result<Option<SubmissionReceipt>, FlagError>;
    fn set(&self, token: &str, receipt: SubmissionReceipt) -> Result<(), FlagError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("submission flag store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySubmissionFlags {
    receipts: Arc<Mutex<HashMap<String, SubmissionReceipt>>>,
}

impl SubmissionFlags for InMemorySubmissionFlags {
    fn get(&self, token: &str) -> Result<Option<SubmissionReceipt>, FlagError> {
        let guard = self
            .receipts
            .lock()
            .map_err(|_| FlagError::Unavailable("flag mutex poisoned".to_string()))?;
        Ok(guard.get(token).cloned())
    }

    fn set(&self, token: &str, receipt: SubmissionReceipt) -> Result<(), FlagError> {
        let mut guard = self
            .receipts
            .lock()
            .map_err(|_| FlagError::Unavailable("flag mutex poisoned".to_string()))?;
        guard.insert(token.to_string(), receipt);
        Ok(())
    }
}
