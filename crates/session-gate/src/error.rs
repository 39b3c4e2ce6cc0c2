//! Session error types.

use bookhive_config_and_utils::ErrorKind;
use remote_service_client::AuthServiceError;
use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Identifier or secret missing; nothing was sent.
    #[error("{0}")]
    ValidationFailed(String),

    /// The auth service rejected the request; displays its message verbatim.
    #[error(transparent)]
    AuthFailed(AuthServiceError),

    /// The persisted session could not be looked up or refreshed.
    #[error("Session could not be restored: {0}")]
    RestoreFailed(#[source] AuthServiceError),

    /// The notification listener runs at most once per manager.
    #[error("Session listener already started")]
    ListenerAlreadyStarted,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::ValidationFailed(_) | SessionError::ListenerAlreadyStarted => {
                ErrorKind::ValidationFailed
            }
            SessionError::AuthFailed(_) => ErrorKind::AuthFailed,
            SessionError::RestoreFailed(_) => ErrorKind::SessionExpired,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
