//! Remote service error types.
//!
//! `Display` of the `Rejected` variants is the service's own message, unmodified,
//! so callers can show it to the user as-is.

use thiserror::Error;

/// Errors from the session store backing a client.
#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authentication service error.
#[derive(Error, Debug)]
pub enum AuthServiceError {
    /// The service answered with an error; `message` is its own text.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// An operation needed a session and there is none.
    #[error("Auth session missing")]
    NotSignedIn,

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// Persisted session could not be read or written
    #[error("Session storage error: {0}")]
    Storage(#[from] SessionStoreError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthServiceError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors are connection failures, timeouts and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthServiceError::Rejected { status, .. } => *status >= 500,
            AuthServiceError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Row store error.
#[derive(Error, Debug)]
pub enum DbError {
    /// The service answered with an error; `message` is its own text.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The response could not be interpreted as rows.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
