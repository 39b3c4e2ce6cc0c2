//! Remote service contract for the BookHive core.
//!
//! This crate provides:
//! - The [`AuthService`] and [`RowStore`] traits the session and record layers consume
//! - A Supabase client (GoTrue auth + PostgREST rows) with session persistence
//!   and automatic token refresh
//! - An in-memory remote with call counters, failure injection and held selects

mod error;
mod memory;
mod notifier;
mod refresh;
mod service;
mod session_store;
mod supabase_client;
mod types;

pub use error::{AuthServiceError, DbError, SessionStoreError};
pub use memory::{logical_timestamp, InMemoryRemote, RemoteOp};
pub use notifier::SessionNotifier;
pub use refresh::RefreshConfig;
pub use service::{AuthService, RowStore};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use supabase_client::{extract_error_message, SupabaseClient};
pub use types::{
    Credentials, Filter, Order, RemoteSession, Row, SessionChange, SessionEvent,
};
