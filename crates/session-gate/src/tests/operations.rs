use super::*;
use crate::{Session, SessionError, SessionStatus, TransitionCause};
use bookhive_config_and_utils::ErrorKind;
use remote_service_client::{Credentials, RemoteOp};

#[tokio::test]
async fn sign_in_authenticates_with_returned_user() {
    let (remote, manager) = setup();
    let user_id = remote.register("reader@example.com", "pw");
    let seen = record_transitions(&manager);

    let session = manager
        .sign_in(&Credentials::new("reader@example.com", "pw"))
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.user_id(), Some(user_id.as_str()));
    assert_eq!(seen.lock().unwrap()[0].cause, TransitionCause::SignIn);
}

#[tokio::test]
async fn sign_in_validates_before_calling_remote() {
    let (remote, manager) = setup();

    for (email, password) in [("", "pw"), ("   ", "pw"), ("reader@example.com", "")] {
        let err = manager
            .sign_in(&Credentials::new(email, password))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    assert_eq!(remote.calls(RemoteOp::SignIn), 0);
    assert_eq!(manager.current(), Session::unknown());
}

#[tokio::test]
async fn sign_in_failure_keeps_state_and_message() {
    let (remote, manager) = setup();
    manager.handle_change(&remote_service_client::SessionChange::signed_out());

    let err = manager
        .sign_in(&Credentials::new("reader@example.com", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AuthFailed(_)));
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert_eq!(manager.current(), Session::unauthenticated());
    assert_eq!(remote.calls(RemoteOp::SignIn), 1);
}

#[tokio::test]
async fn sign_up_never_transitions_by_itself() {
    let (remote, manager) = setup();
    remote.set_auto_confirm(true);

    manager
        .sign_up(&Credentials::new("new@example.com", "pw"))
        .await
        .unwrap();

    // The signed-in notification is only applied by a listener.
    assert_eq!(manager.status(), SessionStatus::Unknown);
}

#[tokio::test]
async fn sign_up_reports_remote_message() {
    let (remote, manager) = setup();
    remote.register("taken@example.com", "pw");

    let err = manager
        .sign_up(&Credentials::new("taken@example.com", "pw"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthFailed);
    assert_eq!(err.to_string(), "User already registered");
}

#[tokio::test]
async fn sign_out_clears_session_even_when_remote_fails() {
    let (remote, manager) = setup();
    remote.register("reader@example.com", "pw");
    manager
        .sign_in(&Credentials::new("reader@example.com", "pw"))
        .await
        .unwrap();
    remote.fail_next(RemoteOp::SignOut, 503, "Service unavailable");

    let err = manager.sign_out().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthFailed);
    assert_eq!(err.to_string(), "Service unavailable");
    let session = manager.current();
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.user_id().is_none());
    assert!(session.email.is_none());
}

#[tokio::test]
async fn sign_out_success() {
    let (remote, manager) = setup();
    remote.register("reader@example.com", "pw");
    manager
        .sign_in(&Credentials::new("reader@example.com", "pw"))
        .await
        .unwrap();
    let seen = record_transitions(&manager);

    manager.sign_out().await.unwrap();

    assert_eq!(manager.current(), Session::unauthenticated());
    assert_eq!(seen.lock().unwrap()[0].cause, TransitionCause::SignOut);
}
