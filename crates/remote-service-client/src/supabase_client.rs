//! Supabase implementation of [`AuthService`] and [`RowStore`].
//!
//! Authentication goes through the GoTrue endpoints under `/auth/v1`, rows
//! through PostgREST under `/rest/v1/{table}`. The signed-in session is kept
//! in memory, mirrored to a [`SessionStore`] and refreshed on demand when it
//! is about to expire.

use crate::error::{AuthServiceError, DbError};
use crate::notifier::SessionNotifier;
use crate::refresh::RefreshConfig;
use crate::service::{AuthService, RowStore};
use crate::session_store::{MemorySessionStore, SessionStore};
use crate::types::{
    Credentials, Filter, Order, RemoteSession, Row, SessionChange, SessionEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Body fields checked, in order, for a human-readable error message.
const ERROR_MESSAGE_FIELDS: [&str; 4] = ["error_description", "msg", "message", "error"];

/// Pull the service's own error message out of a response body.
///
/// Falls back to the raw body, then to the status line when the body is empty.
pub fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ERROR_MESSAGE_FIELDS {
            if let Some(serde_json::Value::String(message)) = map.get(field) {
                if !message.is_empty() {
                    return message.clone();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.to_string()
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// GoTrue token response, shared by password, refresh and auto-confirmed signup.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> RemoteSession {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0),
            (None, Some(secs)) => Some(now + Duration::seconds(secs)),
            (None, None) => None,
        };

        RemoteSession {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }

    /// A signup answer carries tokens only when the project auto-confirms.
    fn from_signup(body: serde_json::Value) -> Result<Option<Self>, serde_json::Error> {
        if body.get("access_token").is_some() {
            serde_json::from_value(body).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Supabase client holding the signed-in session.
pub struct SupabaseClient {
    http_client: reqwest::Client,
    api_url: Url,
    anon_key: String,
    session: Mutex<Option<RemoteSession>>,
    /// Set once the store has been consulted, or a local sign-in/out happened.
    restored: AtomicBool,
    /// Serializes restore and refresh so one refresh token is spent once.
    refresh_lock: tokio::sync::Mutex<()>,
    store: Arc<dyn SessionStore>,
    notifier: SessionNotifier,
    refresh_config: RefreshConfig,
}

impl SupabaseClient {
    /// Create a client for the project at `api_url` (e.g. `https://xyz.supabase.co`).
    ///
    /// The session lives in memory only until [`Self::with_session_store`] is used.
    pub fn new(api_url: Url, anon_key: impl Into<String>) -> Self {
        let mut api_url = api_url;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        Self {
            http_client: reqwest::Client::new(),
            api_url,
            anon_key: anon_key.into(),
            session: Mutex::new(None),
            restored: AtomicBool::new(false),
            refresh_lock: tokio::sync::Mutex::new(()),
            store: Arc::new(MemorySessionStore::new()),
            notifier: SessionNotifier::new(),
            refresh_config: RefreshConfig::default(),
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    /// Resolve a path relative to the project URL.
    fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_url.join(path)
    }

    fn auth_url(&self, path: &str, grant_type: Option<&str>) -> Result<Url, url::ParseError> {
        let mut url = self.endpoint(&format!("auth/v1/{}", path))?;
        if let Some(grant_type) = grant_type {
            url.query_pairs_mut().append_pair("grant_type", grant_type);
        }
        Ok(url)
    }

    /// Build the REST API URL for a table with PostgREST filter and order params.
    pub fn rest_url(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Url, url::ParseError> {
        let mut url = self.endpoint(&format!("rest/v1/{}", table))?;
        {
            let mut query = url.query_pairs_mut();
            for (column, operand) in filter.to_query_pairs() {
                query.append_pair(&column, &operand);
            }
            if let Some(order) = order {
                query.append_pair("order", &order.to_query_value());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn cached_session(&self) -> Option<RemoteSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace_session(&self, session: Option<RemoteSession>) -> Option<RemoteSession> {
        self.restored.store(true, Ordering::SeqCst);
        let mut slot = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *slot, session)
    }

    /// Keep `session` in memory and in the store.
    fn establish(&self, session: &RemoteSession) -> Result<(), AuthServiceError> {
        self.store.save(session)?;
        self.replace_session(Some(session.clone()));
        Ok(())
    }

    /// Drop the session from memory and the store.
    fn discard(&self) -> Result<Option<RemoteSession>, AuthServiceError> {
        let previous = self.replace_session(None);
        self.store.clear()?;
        Ok(previous)
    }

    fn auth_request(&self, url: Url) -> RequestBuilder {
        self.http_client
            .post(url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
    }

    async fn read_auth_response(response: Response) -> Result<serde_json::Value, AuthServiceError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthServiceError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_token_grant<T: Serialize + ?Sized>(
        &self,
        grant_type: &str,
        body: &T,
    ) -> Result<RemoteSession, AuthServiceError> {
        let url = self.auth_url("token", Some(grant_type))?;
        debug!(url = %url, grant_type, "Requesting token");

        let response = self.auth_request(url).json(body).send().await?;
        let body = Self::read_auth_response(response).await?;
        let tokens: TokenResponse = serde_json::from_value(body)?;
        Ok(tokens.into_session(Utc::now()))
    }

    /// Refresh the session with exponential backoff retry.
    async fn refresh_with_backoff(
        &self,
        refresh_token: &str,
    ) -> Result<RemoteSession, AuthServiceError> {
        let max_retries = self.refresh_config.max_retries.max(1);

        for attempt in 0..max_retries {
            let grant = RefreshGrant { refresh_token };
            match self.post_token_grant("refresh_token", &grant).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_transient() => {
                    if attempt + 1 < max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(error = %e, "Refresh failed on final attempt");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed with non-transient error");
                    return Err(e);
                }
            }
        }

        Err(AuthServiceError::RefreshExhausted(max_retries))
    }

    /// Bearer for row requests: the live access token, or the anon key.
    async fn bearer_token(&self) -> String {
        match self.current_session().await {
            Ok(Some(session)) => session.access_token,
            Ok(None) => self.anon_key.clone(),
            Err(e) => {
                debug!(error = %e, "No usable session, falling back to anon key");
                self.anon_key.clone()
            }
        }
    }

    async fn rest_request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.bearer_token().await;
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json")
    }

    /// Send a row request and decode the JSON array it answers with.
    async fn send_for_rows(request: RequestBuilder, what: &str) -> Result<Vec<Row>, DbError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = extract_error_message(status.as_u16(), &body);
            warn!(status = %status, error = %message, "Failed to {}", what);
            return Err(DbError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match serde_json::from_str::<serde_json::Value>(&body)? {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::Object(row) => Ok(row),
                    other => Err(DbError::MalformedResponse(format!(
                        "expected a row object, got {}",
                        other
                    ))),
                })
                .collect(),
            other => Err(DbError::MalformedResponse(format!(
                "expected an array of rows, got {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl AuthService for SupabaseClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<RemoteSession, AuthServiceError> {
        debug!(email = %credentials.email, "Attempting email/password sign-in");

        let grant = PasswordGrant {
            email: &credentials.email,
            password: &credentials.password,
        };
        let session = match self.post_token_grant("password", &grant).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        self.establish(&session)?;
        info!(user_id = %session.user_id, "Sign-in successful");
        self.notifier.emit(SessionChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthServiceError> {
        let url = self.auth_url("signup", None)?;
        debug!(email = %credentials.email, "Attempting sign-up");

        let grant = PasswordGrant {
            email: &credentials.email,
            password: &credentials.password,
        };
        let response = self.auth_request(url).json(&grant).send().await?;
        let body = match Self::read_auth_response(response).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Sign-up failed");
                return Err(e);
            }
        };

        match TokenResponse::from_signup(body)? {
            Some(tokens) => {
                let session = tokens.into_session(Utc::now());
                self.establish(&session)?;
                info!(user_id = %session.user_id, "Sign-up returned a session");
                self.notifier.emit(SessionChange::signed_in(session));
            }
            None => info!("Sign-up accepted, confirmation pending"),
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthServiceError> {
        let previous = self.cached_session();

        let remote_result = match previous {
            Some(ref session) => {
                let request = self
                    .auth_url("logout", None)
                    .map(|url| {
                        self.auth_request(url)
                            .header("Authorization", format!("Bearer {}", session.access_token))
                    });
                match request {
                    Ok(request) => match request.send().await {
                        Ok(response) => Self::read_auth_response(response).await.map(|_| ()),
                        Err(e) => Err(e.into()),
                    },
                    Err(e) => Err(e.into()),
                }
            }
            None => Ok(()),
        };

        let local_result = self.discard().map(|_| ());
        self.notifier.emit(SessionChange::signed_out());

        match &remote_result {
            Ok(()) => info!("Signed out"),
            Err(e) => warn!(error = %e, "Remote sign-out failed, local session discarded"),
        }
        remote_result.and(local_result)
    }

    async fn current_session(&self) -> Result<Option<RemoteSession>, AuthServiceError> {
        let _guard = self.refresh_lock.lock().await;

        let session = match self.cached_session() {
            Some(session) => session,
            None => {
                if self.restored.swap(true, Ordering::SeqCst) {
                    return Ok(None);
                }
                match self.store.load()? {
                    Some(session) => {
                        debug!(user_id = %session.user_id, "Restored persisted session");
                        self.replace_session(Some(session.clone()));
                        self.notifier.emit(SessionChange::new(
                            SessionEvent::InitialSession,
                            Some(session.clone()),
                        ));
                        session
                    }
                    None => return Ok(None),
                }
            }
        };

        if !session.expires_within(Utc::now(), self.refresh_config.expiry_margin()) {
            return Ok(Some(session));
        }

        info!(user_id = %session.user_id, "Access token expiring, refreshing");
        match self.refresh_with_backoff(&session.refresh_token).await {
            Ok(refreshed) => {
                self.establish(&refreshed)?;
                info!(user_id = %refreshed.user_id, "Token refreshed successfully");
                self.notifier.emit(SessionChange::new(
                    SessionEvent::TokenRefreshed,
                    Some(refreshed.clone()),
                ));
                Ok(Some(refreshed))
            }
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "Session expired, clearing");
                // The in-memory session is gone either way; listeners must hear of it.
                let cleared = self.discard();
                self.notifier.emit(SessionChange::expired());
                if let Err(store_err) = cleared {
                    warn!(error = %store_err, "Failed to clear persisted session");
                }
                Err(e)
            }
        }
    }

    fn session_changes(&self) -> mpsc::UnboundedReceiver<SessionChange> {
        self.notifier.subscribe()
    }
}

#[async_trait]
impl RowStore for SupabaseClient {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, DbError> {
        let url = self.rest_url(table, filter, order)?;
        debug!(url = %url, "Selecting rows");

        let request = self.rest_request(Method::GET, url).await;
        let rows = Self::send_for_rows(request, "select rows").await?;
        debug!(table, count = rows.len(), "Selected rows");
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DbError> {
        let url = self.rest_url(table, &Filter::new(), None)?;
        debug!(url = %url, "Inserting row");

        let request = self
            .rest_request(Method::POST, url)
            .await
            .header("Prefer", "return=representation")
            .json(&row);
        Self::send_for_rows(request, "insert row")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::MalformedResponse("insert returned no row".to_string()))
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<u64, DbError> {
        let url = self.rest_url(table, filter, None)?;
        debug!(url = %url, "Updating rows");

        let request = self
            .rest_request(Method::PATCH, url)
            .await
            .header("Prefer", "return=representation")
            .json(&patch);
        let rows = Self::send_for_rows(request, "update rows").await?;
        Ok(rows.len() as u64)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, DbError> {
        let url = self.rest_url(table, filter, None)?;
        debug!(url = %url, "Deleting rows");

        let request = self
            .rest_request(Method::DELETE, url)
            .await
            .header("Prefer", "return=representation");
        let rows = Self::send_for_rows(request, "delete rows").await?;
        Ok(rows.len() as u64)
    }
}
