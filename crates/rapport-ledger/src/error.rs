//! Error types for ledger operations.

use crate::edge::EdgeStatus;
use crate::store::StoreError;

/// Outcome classes of a rejected ledger operation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Missing, blank, or self-referential input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An edge already occupies the pair.
    #[error("friend request already exists with status: {existing}")]
    Conflict { existing: EdgeStatus },

    /// No edge matched where one was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence failure; opaque to callers.
    #[error("store failure: {0}")]
    StoreFailure(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicatePair { existing } => LedgerError::Conflict { existing },
            other => LedgerError::StoreFailure(other),
        }
    }
}

impl LedgerError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "invalid_argument",
            LedgerError::Conflict { .. } => "conflict",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::StoreFailure(_) => "store_failure",
        }
    }
}
