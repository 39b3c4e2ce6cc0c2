//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │     Unknown     │ (initial)
//!                  └────────┬────────┘
//!     SessionRestored /     │     NoSession /
//!     SessionStarted        │     SessionEnded
//!          ┌────────────────┴────────────────┐
//!          ▼                                 ▼
//! ┌─────────────────┐   SessionEnded   ┌─────────────────┐
//! │  Authenticated  │ ───────────────► │ Unauthenticated │
//! │                 │ ◄─────────────── │                 │
//! └─────────────────┘  SessionStarted  └─────────────────┘
//! ```
//!
//! `SessionRestored` and `NoSession` come from the start-up lookup and are
//! only accepted while the state is still `Unknown`.

use chrono::{DateTime, Utc};
use remote_service_client::{RemoteSession, SessionEvent};
use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unknown)

    Unknown => {
        SessionRestored => Authenticated,
        NoSession => Unauthenticated,
        SessionStarted => Authenticated,
        SessionEnded => Unauthenticated
    },
    Authenticated => {
        // Token refresh or a different user signing in
        SessionStarted => Authenticated,
        SessionEnded => Unauthenticated
    },
    Unauthenticated => {
        SessionStarted => Authenticated,
        SessionEnded => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Authentication status as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Not yet resolved; screens wait.
    Unknown,
    Unauthenticated,
    Authenticated,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionStatus::Unknown)
    }
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unknown => SessionStatus::Unknown,
            SessionMachineState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
        }
    }
}

/// The authenticated identity, or its absence.
///
/// `user_id` is `Some` exactly when `status` is `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn unknown() -> Self {
        Self::without_identity(SessionStatus::Unknown)
    }

    pub fn unauthenticated() -> Self {
        Self::without_identity(SessionStatus::Unauthenticated)
    }

    pub fn authenticated(remote: &RemoteSession) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user_id: Some(remote.user_id.clone()),
            email: remote.email.clone(),
            expires_at: remote.expires_at,
        }
    }

    fn without_identity(status: SessionStatus) -> Self {
        Self {
            status,
            user_id: None,
            email: None,
            expires_at: None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.is_authenticated()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unknown()
    }
}

/// What caused a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "event")]
pub enum TransitionCause {
    SignIn,
    SignOut,
    Restore,
    Notification(SessionEvent),
}
