//! Record synchronization error types.

use bookhive_config_and_utils::ErrorKind;
use remote_service_client::DbError;
use thiserror::Error;

/// Why a remote fetch or mutation did not produce a usable result.
#[derive(Error, Debug)]
pub enum StoreFailure {
    /// The row store rejected the call; displays its message verbatim.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The filter matched nothing (already deleted, or not owned).
    #[error("no matching row")]
    NoMatchingRow,

    /// A returned row could not be read as a record.
    #[error("Malformed row: {0}")]
    MalformedRow(#[from] serde_json::Error),
}

/// Record synchronization error type.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A local check failed; nothing was sent.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    FetchFailed(StoreFailure),

    #[error("{0}")]
    MutationFailed(StoreFailure),

    /// No authenticated owner, or the session has left the mounted owner.
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            SyncError::FetchFailed(_) => ErrorKind::FetchFailed,
            SyncError::MutationFailed(_) => ErrorKind::MutationFailed,
            SyncError::NotAuthenticated => ErrorKind::NotAuthenticated,
        }
    }

    pub(crate) fn fetch(failure: impl Into<StoreFailure>) -> Self {
        SyncError::FetchFailed(failure.into())
    }

    pub(crate) fn mutation(failure: impl Into<StoreFailure>) -> Self {
        SyncError::MutationFailed(failure.into())
    }
}

/// Result type for record operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = SyncError::mutation(DbError::Rejected {
            status: 403,
            message: "new row violates row-level security policy".to_string(),
        });
        assert_eq!(err.to_string(), "new row violates row-level security policy");
        assert_eq!(err.kind(), ErrorKind::MutationFailed);
    }

    #[test]
    fn test_zero_rows_message() {
        let err = SyncError::mutation(StoreFailure::NoMatchingRow);
        assert_eq!(err.to_string(), "no matching row");
    }
}
