//! Value types exchanged with the remote service.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row as the row store sees it: one JSON object keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Identifier (email) and secret (password) for sign-in and sign-up.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// An authenticated session as issued by the auth service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RemoteSession {
    /// Returns true if the access token expires before `now + margin`.
    ///
    /// Sessions without an expiry never expire locally.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + margin,
            None => false,
        }
    }
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Why the auth service emitted a session-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    /// Session restored from storage when the client started.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    /// The session could not be refreshed and was dropped.
    SessionExpired,
}

/// One out-of-band session notification.
///
/// `session` is `None` when the notification means "no session".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<RemoteSession>,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Option<RemoteSession>) -> Self {
        Self { event, session }
    }

    pub fn signed_in(session: RemoteSession) -> Self {
        Self::new(SessionEvent::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(SessionEvent::SignedOut, None)
    }

    pub fn expired() -> Self {
        Self::new(SessionEvent::SessionExpired, None)
    }
}

/// Conjunction of `column = value` matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    matches: Vec<(String, serde_json::Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality match on `column`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.matches.push((column.into(), value.into()));
        self
    }

    pub fn matches(&self) -> &[(String, serde_json::Value)] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Returns true if every match holds for `row`.
    pub fn accepts(&self, row: &Row) -> bool {
        self.matches
            .iter()
            .all(|(column, value)| row.get(column).map_or(value.is_null(), |v| v == value))
    }

    /// Encode as PostgREST query pairs, e.g. `("user_id", "eq.u1")`.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.matches
            .iter()
            .map(|(column, value)| {
                let operand = match value {
                    serde_json::Value::Null => "is.null".to_string(),
                    serde_json::Value::String(s) => format!("eq.{}", s),
                    other => format!("eq.{}", other),
                };
                (column.clone(), operand)
            })
            .collect()
    }
}

/// Sort order for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    /// PostgREST `order=` value, e.g. `created_at.desc`.
    pub fn to_query_value(&self) -> String {
        format!(
            "{}.{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }
}
