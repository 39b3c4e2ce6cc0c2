use super::*;
use crate::{Session, SessionError, SessionStatus, TransitionCause};
use remote_service_client::{Credentials, RemoteOp, SessionChange, SessionEvent};
use std::time::Duration;

#[tokio::test]
async fn restore_without_session_resolves_unauthenticated() {
    let (_remote, manager) = setup();
    let seen = record_transitions(&manager);

    let session = manager.restore().await.unwrap();

    assert_eq!(session, Session::unauthenticated());
    assert_eq!(seen.lock().unwrap()[0].cause, TransitionCause::Restore);
}

#[tokio::test]
async fn restore_with_live_session_authenticates() {
    let (remote, manager) = setup();
    remote.emit(SessionChange::new(
        SessionEvent::InitialSession,
        Some(remote_session("u1")),
    ));

    let session = manager.restore().await.unwrap();

    assert_eq!(session.user_id(), Some("u1"));
}

#[tokio::test]
async fn late_restore_does_not_override_notification() {
    let (_remote, manager) = setup();
    manager.handle_change(&SessionChange::signed_in(remote_session("u1")));

    // The remote reports no session: the restore lost the race.
    let session = manager.restore().await.unwrap();

    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.user_id(), Some("u1"));
}

#[tokio::test]
async fn restore_failure_resolves_and_reports() {
    let (remote, manager) = setup();
    remote.fail_next(RemoteOp::CurrentSession, 400, "Invalid Refresh Token");

    let err = manager.restore().await.unwrap_err();

    assert!(matches!(err, SessionError::RestoreFailed(_)));
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn wait_until_resolved_returns_once_known() {
    let (_remote, manager) = setup();
    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait_until_resolved().await })
    };
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    manager.handle_change(&SessionChange::signed_in(remote_session("u1")));

    let session = waiter.await.unwrap();
    assert_eq!(session.user_id(), Some("u1"));
}

#[tokio::test]
async fn wait_until_resolved_after_restore_returns_immediately() {
    let (remote, manager) = setup();
    remote.emit(SessionChange::new(
        SessionEvent::InitialSession,
        Some(remote_session("u1")),
    ));
    manager.restore().await.unwrap();

    let session = tokio::time::timeout(Duration::from_secs(1), manager.wait_until_resolved())
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.user_id(), Some("u1"));
}

#[tokio::test]
async fn wait_until_resolved_after_empty_restore() {
    let (_remote, manager) = setup();
    manager.restore().await.unwrap();

    let session = manager.wait_until_resolved().await;

    assert_eq!(session, Session::unauthenticated());
}

#[tokio::test]
async fn listener_applies_notifications_in_order() {
    let (remote, manager) = setup();
    let seen = record_transitions(&manager);
    let _listener = manager.spawn_listener().unwrap();

    remote.emit(SessionChange::signed_in(remote_session("u1")));
    remote.emit(SessionChange::signed_in(remote_session("u2")));
    remote.emit(SessionChange::expired());
    tokio::time::timeout(Duration::from_secs(1), async {
        while seen.lock().unwrap().len() < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let causes: Vec<_> = seen.lock().unwrap().iter().map(|t| t.cause).collect();
    assert_eq!(
        causes,
        vec![
            TransitionCause::Notification(SessionEvent::SignedIn),
            TransitionCause::Notification(SessionEvent::SignedIn),
            TransitionCause::Notification(SessionEvent::SessionExpired),
        ]
    );
}

#[tokio::test]
async fn listener_picks_up_auto_confirmed_sign_up() {
    let (remote, manager) = setup();
    remote.set_auto_confirm(true);
    let _listener = manager.spawn_listener().unwrap();

    manager
        .sign_up(&Credentials::new("new@example.com", "pw"))
        .await
        .unwrap();

    let mut rx = manager.watch();
    tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|session| session.is_authenticated()),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn listener_starts_only_once() {
    let (_remote, manager) = setup();
    let _listener = manager.spawn_listener().unwrap();

    assert!(matches!(
        manager.spawn_listener(),
        Err(SessionError::ListenerAlreadyStarted)
    ));
}
