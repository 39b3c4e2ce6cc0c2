//! In-process remote used by tests and offline runs.
//!
//! Behaves like a single-project Supabase backend: accounts, one live
//! session, tables of JSON rows with server-assigned `id` and `created_at`.
//! Tests can count calls, inject failures and hold selects open to control
//! the order in which their results arrive.

use crate::error::{AuthServiceError, DbError};
use crate::notifier::SessionNotifier;
use crate::service::{AuthService, RowStore};
use crate::types::{Credentials, Filter, Order, RemoteSession, Row, SessionChange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// First logical `created_at`, in unix seconds.
const CLOCK_EPOCH: i64 = 1_700_000_000;

/// Logical timestamp `tick` seconds after the in-memory clock epoch.
pub fn logical_timestamp(tick: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(CLOCK_EPOCH + tick, 0).unwrap_or_default()
}

/// Remote operation, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    SignIn,
    SignUp,
    SignOut,
    CurrentSession,
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password: String,
}

#[derive(Default)]
struct RemoteState {
    accounts: HashMap<String, Account>,
    session: Option<RemoteSession>,
    auto_confirm: bool,
    tables: HashMap<String, Vec<Row>>,
    next_id: i64,
    clock: i64,
    next_user: u64,
    calls: HashMap<RemoteOp, usize>,
    failures: HashMap<RemoteOp, VecDeque<(u16, String)>>,
    hold_selects: bool,
    held: Vec<Option<oneshot::Sender<()>>>,
}

impl RemoteState {
    /// Count the call and pop an injected failure for it, if any.
    fn record(&mut self, op: RemoteOp) -> Option<(u16, String)> {
        *self.calls.entry(op).or_default() += 1;
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn assign_server_columns(&mut self, row: &mut Row) {
        if !row.contains_key("id") {
            self.next_id += 1;
            row.insert("id".to_string(), self.next_id.into());
        } else if let Some(id) = row.get("id").and_then(serde_json::Value::as_i64) {
            self.next_id = self.next_id.max(id);
        }
        if !row.contains_key("created_at") {
            self.clock += 1;
            row.insert(
                "created_at".to_string(),
                logical_timestamp(self.clock).to_rfc3339().into(),
            );
        }
    }

    fn session_for(&self, email: &str, account: &Account) -> RemoteSession {
        RemoteSession {
            user_id: account.user_id.clone(),
            email: Some(email.to_string()),
            access_token: format!("access-{}", account.user_id),
            refresh_token: format!("refresh-{}", account.user_id),
            expires_at: None,
        }
    }
}

fn compare_values(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, Some(_)) => Ordering::Greater,
        (Some(_), Some(Value::Null) | None) => Ordering::Less,
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

/// In-memory [`AuthService`] and [`RowStore`].
#[derive(Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
    notifier: SessionNotifier,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an account; returns its user id.
    pub fn register(&self, email: &str, password: &str) -> String {
        let mut state = self.state();
        state.next_user += 1;
        let user_id = format!("user-{}", state.next_user);
        state.accounts.insert(
            email.to_string(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        user_id
    }

    /// Whether sign-up signs the new identity in right away.
    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.state().auto_confirm = auto_confirm;
    }

    /// Make the next call to `op` fail with `status` and `message`.
    pub fn fail_next(&self, op: RemoteOp, status: u16, message: impl Into<String>) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .push_back((status, message.into()));
    }

    pub fn calls(&self, op: RemoteOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Emit a notification as if it came from the service.
    pub fn emit(&self, change: SessionChange) {
        self.state().session = change.session.clone();
        self.notifier.emit(change);
    }

    /// Insert a row directly, filling `id` and `created_at` when absent.
    pub fn seed(&self, table: &str, row: Row) -> Row {
        let mut state = self.state();
        let mut row = row;
        state.assign_server_columns(&mut row);
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Current rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// While on, every select captures its result when issued and then waits
    /// for [`Self::release_select`].
    pub fn hold_selects(&self, hold: bool) {
        self.state().hold_selects = hold;
    }

    /// Number of selects held so far, released or not.
    pub fn held_selects(&self) -> usize {
        self.state().held.len()
    }

    /// Let the `index`-th held select (in issue order) return.
    ///
    /// Returns false if there is no such select or it was already released.
    pub fn release_select(&self, index: usize) -> bool {
        let sender = self
            .state()
            .held
            .get_mut(index)
            .and_then(Option::take);
        match sender {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Yield until at least `count` selects are held.
    pub async fn wait_for_held_selects(&self, count: usize) {
        while self.held_selects() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl AuthService for InMemoryRemote {
    async fn sign_in(&self, credentials: &Credentials) -> Result<RemoteSession, AuthServiceError> {
        let session = {
            let mut state = self.state();
            if let Some((status, message)) = state.record(RemoteOp::SignIn) {
                return Err(AuthServiceError::Rejected { status, message });
            }
            let account = state
                .accounts
                .get(&credentials.email)
                .filter(|account| account.password == credentials.password)
                .cloned()
                .ok_or_else(|| AuthServiceError::Rejected {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                })?;
            let session = state.session_for(&credentials.email, &account);
            state.session = Some(session.clone());
            session
        };

        debug!(user_id = %session.user_id, "In-memory sign-in");
        self.notifier.emit(SessionChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthServiceError> {
        let session = {
            let mut state = self.state();
            if let Some((status, message)) = state.record(RemoteOp::SignUp) {
                return Err(AuthServiceError::Rejected { status, message });
            }
            if state.accounts.contains_key(&credentials.email) {
                return Err(AuthServiceError::Rejected {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }
            state.next_user += 1;
            let account = Account {
                user_id: format!("user-{}", state.next_user),
                password: credentials.password.clone(),
            };
            state
                .accounts
                .insert(credentials.email.clone(), account.clone());

            if state.auto_confirm {
                let session = state.session_for(&credentials.email, &account);
                state.session = Some(session.clone());
                Some(session)
            } else {
                None
            }
        };

        if let Some(session) = session {
            self.notifier.emit(SessionChange::signed_in(session));
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthServiceError> {
        let failure = {
            let mut state = self.state();
            let failure = state.record(RemoteOp::SignOut);
            state.session = None;
            failure
        };

        self.notifier.emit(SessionChange::signed_out());
        match failure {
            Some((status, message)) => Err(AuthServiceError::Rejected { status, message }),
            None => Ok(()),
        }
    }

    async fn current_session(&self) -> Result<Option<RemoteSession>, AuthServiceError> {
        let mut state = self.state();
        if let Some((status, message)) = state.record(RemoteOp::CurrentSession) {
            return Err(AuthServiceError::Rejected { status, message });
        }
        Ok(state.session.clone())
    }

    fn session_changes(&self) -> mpsc::UnboundedReceiver<SessionChange> {
        self.notifier.subscribe()
    }
}

#[async_trait]
impl RowStore for InMemoryRemote {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, DbError> {
        let (result, hold) = {
            let mut state = self.state();
            let result = match state.record(RemoteOp::Select) {
                Some((status, message)) => Err(DbError::Rejected { status, message }),
                None => {
                    let mut rows: Vec<Row> = state
                        .tables
                        .get(table)
                        .map(|rows| rows.iter().filter(|row| filter.accepts(row)).cloned().collect())
                        .unwrap_or_default();
                    if let Some(order) = order {
                        rows.sort_by(|a, b| {
                            let ordering =
                                compare_values(a.get(&order.column), b.get(&order.column));
                            if order.ascending {
                                ordering
                            } else {
                                ordering.reverse()
                            }
                        });
                    }
                    Ok(rows)
                }
            };

            let hold = if state.hold_selects {
                let (tx, rx) = oneshot::channel();
                state.held.push(Some(tx));
                Some(rx)
            } else {
                None
            };
            (result, hold)
        };

        if let Some(rx) = hold {
            let _ = rx.await;
        }
        result
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DbError> {
        let mut state = self.state();
        if let Some((status, message)) = state.record(RemoteOp::Insert) {
            return Err(DbError::Rejected { status, message });
        }

        let mut row = row;
        row.remove("id");
        row.remove("created_at");
        state.assign_server_columns(&mut row);
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<u64, DbError> {
        let mut state = self.state();
        if let Some((status, message)) = state.record(RemoteOp::Update) {
            return Err(DbError::Rejected { status, message });
        }

        let mut affected = 0;
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filter.accepts(row)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, DbError> {
        let mut state = self.state();
        if let Some((status, message)) = state.record(RemoteOp::Delete) {
            return Err(DbError::Rejected { status, message });
        }

        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filter.accepts(row));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionEvent;
    use serde_json::json;
    use std::sync::Arc;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let remote = InMemoryRemote::new();
        let user_id = remote.register("reader@example.com", "pw");
        let mut changes = remote.session_changes();

        let err = remote
            .sign_in(&Credentials::new("reader@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");

        let session = remote
            .sign_in(&Credentials::new("reader@example.com", "pw"))
            .await
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(changes.try_recv().unwrap().event, SessionEvent::SignedIn);
        assert_eq!(remote.calls(RemoteOp::SignIn), 2);
    }

    #[tokio::test]
    async fn test_sign_up_auto_confirm_emits_signed_in() {
        let remote = InMemoryRemote::new();
        let mut changes = remote.session_changes();

        remote
            .sign_up(&Credentials::new("a@example.com", "pw"))
            .await
            .unwrap();
        assert!(changes.try_recv().is_err());

        remote.set_auto_confirm(true);
        remote
            .sign_up(&Credentials::new("b@example.com", "pw"))
            .await
            .unwrap();
        assert_eq!(changes.try_recv().unwrap().event, SessionEvent::SignedIn);

        let err = remote
            .sign_up(&Credentials::new("b@example.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already registered");
    }

    #[tokio::test]
    async fn test_sign_out_failure_still_signs_out() {
        let remote = InMemoryRemote::new();
        remote.register("reader@example.com", "pw");
        remote
            .sign_in(&Credentials::new("reader@example.com", "pw"))
            .await
            .unwrap();
        remote.fail_next(RemoteOp::SignOut, 503, "unavailable");

        assert!(remote.sign_out().await.is_err());
        assert!(remote.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_crud_with_filter_and_order() {
        let remote = InMemoryRemote::new();
        let first = remote
            .insert("books", row(json!({"user_id": "u1", "title": "A"})))
            .await
            .unwrap();
        remote
            .insert("books", row(json!({"user_id": "u1", "title": "B"})))
            .await
            .unwrap();
        remote
            .insert("books", row(json!({"user_id": "u2", "title": "C"})))
            .await
            .unwrap();
        assert_eq!(first["id"], json!(1));

        let rows = remote
            .select(
                "books",
                &Filter::new().eq("user_id", "u1"),
                Some(&Order::desc("created_at")),
            )
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("B"), json!("A")]);

        let owned = Filter::new().eq("id", 1).eq("user_id", "u1");
        let patch = row(json!({"title": "A2"}));
        assert_eq!(remote.update("books", &owned, patch.clone()).await.unwrap(), 1);
        let foreign = Filter::new().eq("id", 1).eq("user_id", "u2");
        assert_eq!(remote.update("books", &foreign, patch).await.unwrap(), 0);

        assert_eq!(remote.delete("books", &owned).await.unwrap(), 1);
        assert_eq!(remote.delete("books", &owned).await.unwrap(), 0);
        assert_eq!(remote.rows("books").len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let remote = InMemoryRemote::new();
        remote.fail_next(RemoteOp::Insert, 403, "denied");

        let err = remote
            .insert("books", row(json!({"title": "A"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "denied");
        assert!(remote.insert("books", row(json!({"title": "A"}))).await.is_ok());
        assert_eq!(remote.calls(RemoteOp::Insert), 2);
    }

    #[tokio::test]
    async fn test_held_select_returns_snapshot_from_issue_time() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.seed("books", row(json!({"title": "A"})));
        remote.hold_selects(true);

        let pending = {
            let remote = remote.clone();
            tokio::spawn(async move { remote.select("books", &Filter::new(), None).await })
        };
        remote.wait_for_held_selects(1).await;

        remote.seed("books", row(json!({"title": "B"})));
        assert!(remote.release_select(0));
        assert!(!remote.release_select(0));

        let rows = pending.await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
    }
}
