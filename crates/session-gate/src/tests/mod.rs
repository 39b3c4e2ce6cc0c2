//! Tests for the session manager.
//!
//! - `transitions.rs` - notification handling, observer delivery and ordering
//! - `operations.rs`  - sign-in, sign-up and sign-out
//! - `restore.rs`     - start-up restore, resolution waiting and the listener

mod operations;
mod restore;

use crate::{SessionManager, SessionTransition};
use remote_service_client::{InMemoryRemote, RemoteSession};
use std::sync::{Arc, Mutex};

pub(crate) fn remote_session(user_id: &str) -> RemoteSession {
    RemoteSession {
        user_id: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id)),
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_at: None,
    }
}

pub(crate) fn setup() -> (Arc<InMemoryRemote>, Arc<SessionManager>) {
    let remote = Arc::new(InMemoryRemote::new());
    let manager = Arc::new(SessionManager::new(remote.clone()));
    (remote, manager)
}

/// Record every transition the manager delivers.
pub(crate) fn record_transitions(manager: &SessionManager) -> Arc<Mutex<Vec<SessionTransition>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager.subscribe(move |transition| sink.lock().unwrap().push(transition.clone()));
    seen
}
