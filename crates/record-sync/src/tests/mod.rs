//! Tests for the record synchronization controller.
//!
//! - `ordering.rs`  - fetch sequencing and the loading flag
//! - `mutations.rs` - create, update and delete
//! - `lifecycle.rs` - mounting, owner changes and the end-to-end flow

mod mutations;

use crate::RecordSync;
use remote_service_client::{InMemoryRemote, RemoteSession, Row, SessionChange};
use serde_json::json;
use session_gate::SessionManager;
use std::sync::Arc;

pub(crate) const TABLE: &str = "books";

pub(crate) fn remote_session(user_id: &str) -> RemoteSession {
    RemoteSession {
        user_id: user_id.to_string(),
        email: None,
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_at: None,
    }
}

pub(crate) fn book_row(user_id: &str, title: &str) -> Row {
    json!({"user_id": user_id, "title": title, "author": "Author"})
        .as_object()
        .cloned()
        .unwrap()
}

pub(crate) struct Harness {
    pub remote: Arc<InMemoryRemote>,
    pub session: Arc<SessionManager>,
    pub sync: Arc<RecordSync>,
}

/// A controller mounted for `user_id`, signed in through a notification.
pub(crate) fn mounted(user_id: &str) -> Harness {
    let remote = Arc::new(InMemoryRemote::new());
    let session = Arc::new(SessionManager::new(remote.clone()));
    session.handle_change(&SessionChange::signed_in(remote_session(user_id)));
    let sync = RecordSync::mount(session.clone(), remote.clone()).unwrap();
    Harness {
        remote,
        session,
        sync,
    }
}

pub(crate) fn titles(sync: &RecordSync) -> Vec<String> {
    sync.records().into_iter().map(|r| r.title).collect()
}
