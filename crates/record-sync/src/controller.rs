//! Controller keeping the signed-in user's book list in step with the row store.
//!
//! Mutations are confirm-then-apply: the local list only changes after the
//! remote call succeeds. Fetches are tagged with an issue sequence and only
//! the most recently issued one may replace the list.

use crate::error::{StoreFailure, SyncError, SyncResult};
use crate::record::{Record, RecordDraft, RecordId, RecordPatch};
use bookhive_config_and_utils::DEFAULT_RECORDS_TABLE;
use parking_lot::Mutex;
use remote_service_client::{Filter, Order, RowStore};
use serde::Serialize;
use session_gate::{SessionManager, SessionTransition, SubscriptionId};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Published view of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordsSnapshot {
    pub records: Vec<Record>,
    pub loading: bool,
    /// `None` once the session has left the mounted owner.
    pub owner_id: Option<String>,
}

/// Result of a [`RecordSync::refresh`] that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched rows replaced the list.
    Applied,
    /// A later fetch was issued (or the owner left) first; the rows were dropped.
    Superseded,
}

#[derive(Default)]
struct SyncState {
    owner_id: Option<String>,
    records: Vec<Record>,
    loading: bool,
    /// Last sequence number handed out.
    next_seq: u64,
    /// Sequence of the fetch allowed to apply.
    latest_seq: u64,
}

impl SyncState {
    fn owner(&self) -> SyncResult<String> {
        self.owner_id.clone().ok_or(SyncError::NotAuthenticated)
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.latest_seq = self.next_seq;
        self.next_seq
    }

    fn insert_ordered(&mut self, record: Record) {
        self.records.retain(|existing| existing.id != record.id);
        let position = self
            .records
            .partition_point(|existing| Record::newest_first(existing, &record).is_lt());
        self.records.insert(position, record);
    }

    fn snapshot(&self) -> RecordsSnapshot {
        RecordsSnapshot {
            records: self.records.clone(),
            loading: self.loading,
            owner_id: self.owner_id.clone(),
        }
    }
}

/// Owner-scoped record list mounted on an authenticated session.
pub struct RecordSync {
    session: Arc<SessionManager>,
    store: Arc<dyn RowStore>,
    table: String,
    state: Mutex<SyncState>,
    snapshot_tx: watch::Sender<RecordsSnapshot>,
    subscription: SubscriptionId,
}

impl RecordSync {
    /// Mount on the `books` table for the session's current user.
    pub fn mount(
        session: Arc<SessionManager>,
        store: Arc<dyn RowStore>,
    ) -> SyncResult<Arc<Self>> {
        Self::mount_with_table(session, store, DEFAULT_RECORDS_TABLE)
    }

    /// Mount on `table` for the session's current user.
    ///
    /// Fails with `NotAuthenticated` unless the session is authenticated.
    pub fn mount_with_table(
        session: Arc<SessionManager>,
        store: Arc<dyn RowStore>,
        table: impl Into<String>,
    ) -> SyncResult<Arc<Self>> {
        let current = session.current();
        let owner = match (current.is_authenticated(), current.user_id) {
            (true, Some(user_id)) => user_id,
            _ => return Err(SyncError::NotAuthenticated),
        };

        let state = SyncState {
            owner_id: Some(owner.clone()),
            ..SyncState::default()
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        let table = table.into();

        let sync = Arc::new_cyclic(|weak: &Weak<RecordSync>| {
            let weak = weak.clone();
            let subscription = session.subscribe(move |transition| {
                if let Some(sync) = weak.upgrade() {
                    sync.on_session_transition(transition);
                }
            });
            RecordSync {
                session: session.clone(),
                store,
                table,
                state: Mutex::new(state),
                snapshot_tx,
                subscription,
            }
        });

        // A transition between reading the owner and subscribing was missed.
        if sync.session.user_id().as_deref() != Some(owner.as_str()) {
            sync.detach();
            return Err(SyncError::NotAuthenticated);
        }

        info!(owner_id = %owner, table = %sync.table, "Record sync mounted");
        Ok(sync)
    }

    fn on_session_transition(&self, transition: &SessionTransition) {
        let owner = self.state.lock().owner_id.clone();
        if let Some(owner) = owner {
            if transition.current.user_id() != Some(owner.as_str()) {
                info!(
                    owner_id = %owner,
                    cause = ?transition.cause,
                    "Session left owner, clearing records"
                );
                self.detach();
            }
        }
    }

    /// Forget the owner, clear the list and invalidate in-flight fetches.
    fn detach(&self) {
        let mut state = self.state.lock();
        state.owner_id = None;
        state.records.clear();
        state.loading = false;
        state.issue_seq();
        self.publish(&state);
    }

    fn publish(&self, state: &SyncState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn owner_id(&self) -> Option<String> {
        self.state.lock().owner_id.clone()
    }

    pub fn snapshot(&self) -> RecordsSnapshot {
        self.state.lock().snapshot()
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.lock().records.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<RecordsSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn owner_filter(owner: &str) -> Filter {
        Filter::new().eq("user_id", owner)
    }

    fn record_filter(id: RecordId, owner: &str) -> Filter {
        Filter::new().eq("id", id).eq("user_id", owner)
    }

    /// Fetch the owner's records and replace the list.
    ///
    /// Only the most recently issued fetch applies; an older one that finishes
    /// later returns [`RefreshOutcome::Superseded`], even if it failed.
    pub async fn refresh(&self) -> SyncResult<RefreshOutcome> {
        let (seq, owner) = {
            let mut state = self.state.lock();
            let owner = state.owner()?;
            let seq = state.issue_seq();
            state.loading = true;
            self.publish(&state);
            (seq, owner)
        };
        debug!(seq, owner_id = %owner, "Fetching records");

        let result = self
            .store
            .select(
                &self.table,
                &Self::owner_filter(&owner),
                Some(&Order::desc("created_at")),
            )
            .await
            .map_err(SyncError::fetch)
            .and_then(|rows| {
                rows.into_iter()
                    .map(Record::from_row)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(SyncError::fetch)
            });

        let mut state = self.state.lock();
        if state.latest_seq != seq {
            debug!(seq, latest = state.latest_seq, "Discarding superseded fetch");
            return Ok(RefreshOutcome::Superseded);
        }
        state.loading = false;

        match result {
            Ok(mut records) => {
                records.sort_by(Record::newest_first);
                info!(seq, count = records.len(), "Records fetched");
                state.records = records;
                self.publish(&state);
                Ok(RefreshOutcome::Applied)
            }
            Err(e) => {
                warn!(seq, error = %e, "Failed to fetch records");
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// Insert a new record and, once confirmed, place it in the list.
    pub async fn create(&self, draft: &RecordDraft) -> SyncResult<Record> {
        let draft = draft.normalized()?;
        let owner = self.state.lock().owner()?;

        let row = self
            .store
            .insert(&self.table, draft.to_row(&owner))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to insert record");
                SyncError::mutation(e)
            })?;
        let record = Record::from_row(row).map_err(SyncError::mutation)?;

        let mut state = self.state.lock();
        if state.owner_id.as_deref() == Some(owner.as_str()) {
            state.insert_ordered(record.clone());
            self.publish(&state);
            info!(id = record.id, "Record created");
        } else {
            debug!(id = record.id, "Owner left before insert confirmed, not applied");
        }
        Ok(record)
    }

    /// Replace the editable fields of record `id`.
    ///
    /// `id` must be in the local list. The list is patched locally on success
    /// without a re-fetch; the patched record is returned if it is still listed.
    pub async fn update(&self, id: RecordId, patch: &RecordPatch) -> SyncResult<Option<Record>> {
        let owner = {
            let state = self.state.lock();
            let owner = state.owner()?;
            if !state.records.iter().any(|record| record.id == id) {
                return Err(SyncError::ValidationFailed(format!(
                    "Book {} is not in the list",
                    id
                )));
            }
            owner
        };
        let patch = patch.normalized()?;

        let affected = self
            .store
            .update(
                &self.table,
                &Self::record_filter(id, &owner),
                patch.to_row(&owner),
            )
            .await
            .map_err(|e| {
                warn!(id, error = %e, "Failed to update record");
                SyncError::mutation(e)
            })?;
        if affected == 0 {
            warn!(id, "Update matched no row");
            return Err(SyncError::mutation(StoreFailure::NoMatchingRow));
        }

        let mut state = self.state.lock();
        let updated = if state.owner_id.as_deref() == Some(owner.as_str()) {
            state
                .records
                .iter_mut()
                .find(|record| record.id == id)
                .map(|record| {
                    record.apply(&patch);
                    record.clone()
                })
        } else {
            None
        };
        self.publish(&state);
        info!(id, "Record updated");
        Ok(updated)
    }

    /// Delete record `id`; it leaves the list only after confirmation.
    pub async fn delete(&self, id: RecordId) -> SyncResult<()> {
        let owner = self.state.lock().owner()?;

        let affected = self
            .store
            .delete(&self.table, &Self::record_filter(id, &owner))
            .await
            .map_err(|e| {
                warn!(id, error = %e, "Failed to delete record");
                SyncError::mutation(e)
            })?;
        if affected == 0 {
            warn!(id, "Delete matched no row");
            return Err(SyncError::mutation(StoreFailure::NoMatchingRow));
        }

        let mut state = self.state.lock();
        if state.owner_id.as_deref() == Some(owner.as_str()) {
            state.records.retain(|record| record.id != id);
            self.publish(&state);
        }
        info!(id, "Record deleted");
        Ok(())
    }
}

impl Drop for RecordSync {
    fn drop(&mut self) {
        self.session.unsubscribe(self.subscription);
        debug!(table = %self.table, "Record sync unmounted");
    }
}
