//! crates/daily_drill_core/src/services/mod.rs
//!
//! The core services: daily-set assignment, submission handling and the
//! history projection. Each service works against the `RecordStore` (and,
//! for submissions, the `ScoringService`) ports and owns no state of its
//! own; all cross-request coordination lives in the store.

pub mod assigner;
pub mod history;
pub mod submission;

#[cfg(test)]
pub(crate) mod support;

use crate::ports::PortError;

/// The error taxonomy shared by all core services.
///
/// `Validation`, `QuotaExceeded` and `AlreadyAnswered` are terminal and are
/// returned before any side effect; `Store` aborts the operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Daily answer quota reached")]
    QuotaExceeded,
    #[error("Question already answered today")]
    AlreadyAnswered,
    #[error("Not enough active questions to build a daily set")]
    InsufficientContent,
    #[error("Record store failure: {0}")]
    Store(String),
}

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => ServiceError::NotFound(what),
            PortError::Conflict(_) => ServiceError::AlreadyAnswered,
            PortError::QuotaExceeded => ServiceError::QuotaExceeded,
            PortError::Unauthorized => ServiceError::Store("unauthorized store access".into()),
            PortError::Unexpected(msg) => ServiceError::Store(msg),
        }
    }
}

pub use assigner::SessionAssigner;
pub use history::HistoryAggregator;
pub use submission::{SubmissionController, SubmissionOutcome};
