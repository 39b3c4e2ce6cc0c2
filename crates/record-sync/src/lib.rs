//! Book list synchronization for BookHive.
//!
//! `RecordSync` owns the in-memory list of the signed-in user's books. It is
//! mounted on an authenticated [`session_gate::SessionManager`] and talks to
//! any [`remote_service_client::RowStore`]:
//!
//! - fetches replace the list, and only the latest issued fetch may apply
//! - create, update and delete change the list only after remote confirmation
//! - the list is cleared as soon as the session leaves the mounted owner

mod controller;
mod error;
mod record;

#[cfg(test)]
mod tests;

pub use controller::{RecordSync, RecordsSnapshot, RefreshOutcome};
pub use error::{StoreFailure, SyncError, SyncResult};
pub use record::{Record, RecordDraft, RecordId, RecordPatch};
