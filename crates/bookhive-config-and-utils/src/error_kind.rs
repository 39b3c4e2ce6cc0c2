//! Presentation-facing classification of every error the core can report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error category shared by the session and record crates.
///
/// Each crate keeps its own error enum; `kind()` on those enums maps into
/// this type so a presentation layer can pick a dialog title without
/// matching on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected or network failure while talking to the auth service.
    AuthFailed,
    /// The session ended out of band (delivered as a notification).
    SessionExpired,
    /// Loading the record list failed.
    FetchFailed,
    /// Insert, update or delete was rejected, including zero affected rows.
    MutationFailed,
    /// A local pre-flight check failed; nothing was sent.
    ValidationFailed,
    /// The operation needs an authenticated owner and there is none.
    NotAuthenticated,
}

impl ErrorKind {
    /// Short human-readable title, e.g. for an alert dialog.
    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "Authentication failed",
            ErrorKind::SessionExpired => "Session expired",
            ErrorKind::FetchFailed => "Error fetching books",
            ErrorKind::MutationFailed => "Error saving book",
            ErrorKind::ValidationFailed => "Invalid input",
            ErrorKind::NotAuthenticated => "Not logged in",
        }
    }

    /// Returns true if the failure originated at the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ErrorKind::AuthFailed
                | ErrorKind::SessionExpired
                | ErrorKind::FetchFailed
                | ErrorKind::MutationFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_kinds_are_not_remote() {
        assert!(!ErrorKind::ValidationFailed.is_remote());
        assert!(!ErrorKind::NotAuthenticated.is_remote());
        assert!(ErrorKind::MutationFailed.is_remote());
        assert!(ErrorKind::SessionExpired.is_remote());
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MutationFailed).unwrap();
        assert_eq!(json, "\"mutation_failed\"");
    }
}
