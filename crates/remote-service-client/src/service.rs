//! Capability traits consumed by the session and record layers.

use crate::error::{AuthServiceError, DbError};
use crate::types::{Credentials, Filter, Order, RemoteSession, Row, SessionChange};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Session-based authentication.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticate and return the new session.
    ///
    /// Implementations also emit a `SignedIn` notification.
    async fn sign_in(&self, credentials: &Credentials) -> Result<RemoteSession, AuthServiceError>;

    /// Create a new identity.
    ///
    /// Whether the identity is signed in right away is service-dependent; if
    /// it is, the implementation emits a `SignedIn` notification.
    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthServiceError>;

    /// Invalidate the current session.
    ///
    /// The local session is discarded (and `SignedOut` emitted) even when the
    /// remote call fails; the failure is still returned.
    async fn sign_out(&self) -> Result<(), AuthServiceError>;

    /// Look up the current session, restoring or refreshing it as needed.
    async fn current_session(&self) -> Result<Option<RemoteSession>, AuthServiceError>;

    /// Open a new notification stream.
    ///
    /// Every receiver sees every notification emitted after it was opened, in
    /// emission order.
    fn session_changes(&self) -> mpsc::UnboundedReceiver<SessionChange>;
}

/// Row-oriented persistence.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, DbError>;

    /// Insert one row and return it as stored, with server-assigned columns.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, DbError>;

    /// Apply `patch` to every row matching `filter`; returns rows affected.
    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<u64, DbError>;

    /// Delete every row matching `filter`; returns rows affected.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, DbError>;
}
