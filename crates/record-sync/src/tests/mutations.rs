use super::*;
use crate::{RecordDraft, StoreFailure, SyncError};
use bookhive_config_and_utils::ErrorKind;
use remote_service_client::{Filter, RemoteOp, RowStore};

#[tokio::test]
async fn create_rejects_blank_fields_without_remote_call() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "Existing"));
    h.sync.refresh().await.unwrap();

    for draft in [RecordDraft::new("", "X"), RecordDraft::new("X", "   ")] {
        let err = h.sync.create(&draft).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    assert_eq!(h.remote.calls(RemoteOp::Insert), 0);
    assert_eq!(titles(&h.sync), vec!["Existing"]);
}

#[tokio::test]
async fn create_applies_confirmed_record_only() {
    let h = mounted("u1");

    let record = h
        .sync
        .create(&RecordDraft::new(" Dune ", "Frank Herbert").with_publication_year(1965))
        .await
        .unwrap();

    assert_eq!(record.title, "Dune");
    assert_eq!(record.user_id, "u1");
    assert_eq!(h.sync.records(), vec![record]);
    assert_eq!(h.remote.rows(TABLE)[0]["user_id"], json!("u1"));
}

#[tokio::test]
async fn failed_create_leaves_list_unchanged() {
    let h = mounted("u1");
    h.remote
        .fail_next(RemoteOp::Insert, 403, "new row violates row-level security policy");

    let err = h
        .sync
        .create(&RecordDraft::new("Dune", "Frank Herbert"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MutationFailed);
    assert_eq!(err.to_string(), "new row violates row-level security policy");
    assert!(h.sync.records().is_empty());
}

#[tokio::test]
async fn update_unknown_id_fails_before_remote_call() {
    let h = mounted("u1");

    let err = h
        .sync
        .update(42, &RecordDraft::new("Title", "Author"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ValidationFailed(_)));
    assert_eq!(h.remote.calls(RemoteOp::Update), 0);
}

#[tokio::test]
async fn update_replaces_editable_fields_without_refetch() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "Old"));
    h.sync.refresh().await.unwrap();
    let id = h.sync.records()[0].id;
    let selects = h.remote.calls(RemoteOp::Select);

    let updated = h
        .sync
        .update(id, &RecordDraft::new("New", "Someone").with_isbn("978-0441013593"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "New");
    assert_eq!(updated.isbn.as_deref(), Some("978-0441013593"));
    assert_eq!(h.sync.records(), vec![updated]);
    assert_eq!(h.remote.calls(RemoteOp::Select), selects);
}

#[tokio::test]
async fn update_rejects_blank_patch() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "Old"));
    h.sync.refresh().await.unwrap();
    let id = h.sync.records()[0].id;

    let err = h
        .sync
        .update(id, &RecordDraft::new(" ", "Someone"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(h.remote.calls(RemoteOp::Update), 0);
}

#[tokio::test]
async fn failed_update_keeps_previous_value() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "Old"));
    h.sync.refresh().await.unwrap();
    let id = h.sync.records()[0].id;
    h.remote.fail_next(RemoteOp::Update, 500, "boom");

    let err = h
        .sync
        .update(id, &RecordDraft::new("New", "Someone"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MutationFailed);
    assert_eq!(titles(&h.sync), vec!["Old"]);
}

#[tokio::test]
async fn update_of_row_deleted_remotely_matches_nothing() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "Gone"));
    h.sync.refresh().await.unwrap();
    let id = h.sync.records()[0].id;
    h.remote
        .delete(TABLE, &Filter::new().eq("id", id))
        .await
        .unwrap();

    let err = h
        .sync
        .update(id, &RecordDraft::new("New", "Someone"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::MutationFailed(StoreFailure::NoMatchingRow)
    ));
    assert_eq!(err.to_string(), "no matching row");
    assert_eq!(titles(&h.sync), vec!["Gone"]);
}

#[tokio::test]
async fn delete_removes_exactly_that_record() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "A"));
    h.remote.seed(TABLE, book_row("u1", "B"));
    h.remote.seed(TABLE, book_row("u1", "C"));
    h.sync.refresh().await.unwrap();
    let b = h.sync.records()[1].id;

    h.sync.delete(b).await.unwrap();

    assert_eq!(titles(&h.sync), vec!["C", "A"]);
    assert_eq!(h.remote.rows(TABLE).len(), 2);
}

#[tokio::test]
async fn failed_delete_leaves_list_unchanged() {
    let h = mounted("u1");
    h.remote.seed(TABLE, book_row("u1", "A"));
    h.sync.refresh().await.unwrap();
    let id = h.sync.records()[0].id;
    h.remote.fail_next(RemoteOp::Delete, 503, "Service unavailable");

    let err = h.sync.delete(id).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MutationFailed);
    assert_eq!(titles(&h.sync), vec!["A"]);
}

#[tokio::test]
async fn delete_is_scoped_to_owner() {
    let h = mounted("u1");
    let foreign = h.remote.seed(TABLE, book_row("u2", "Theirs"));
    let foreign_id = foreign["id"].as_i64().unwrap();

    let err = h.sync.delete(foreign_id).await.unwrap_err();

    assert_eq!(err.to_string(), "no matching row");
    assert_eq!(h.remote.rows(TABLE).len(), 1);
}
