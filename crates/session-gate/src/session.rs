//! Session manager gating the rest of the app on authentication state.
//!
//! The `SessionManager` owns the single live [`Session`], drives it through
//! an explicit state machine and publishes every change to observers and
//! `watch` receivers. Status changes come from three places: the start-up
//! restore, the manager's own sign-in/sign-out results, and session-change
//! notifications from the auth service.

use crate::error::{SessionError, SessionResult};
use crate::session_fsm::{
    Session, SessionMachine, SessionMachineInput, SessionStatus, TransitionCause,
};
use bookhive_config_and_utils::ErrorKind;
use parking_lot::Mutex;
use remote_service_client::{AuthService, Credentials, SessionChange, SessionEvent};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One applied change of the live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    pub previous: Session,
    pub current: Session,
    pub cause: TransitionCause,
}

impl SessionTransition {
    /// Error to surface alongside this transition, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.cause {
            TransitionCause::Notification(SessionEvent::SessionExpired) => {
                Some(ErrorKind::SessionExpired)
            }
            _ => None,
        }
    }

    /// Returns true if the owner (user id) differs before and after.
    pub fn owner_changed(&self) -> bool {
        self.previous.user_id != self.current.user_id
    }
}

/// Callback type for session transitions.
pub type SessionObserver = Arc<dyn Fn(&SessionTransition) + Send + Sync>;

/// Handle returned by [`SessionManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Session manager with FSM-based state tracking.
pub struct SessionManager {
    auth: Arc<dyn AuthService>,
    fsm: Mutex<SessionMachine>,
    session_tx: watch::Sender<Session>,
    observers: Mutex<Vec<(SubscriptionId, SessionObserver)>>,
    next_subscription: AtomicU64,
    /// Held while a transition is applied and delivered.
    transition_lock: Mutex<()>,
    listener_started: AtomicBool,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let (session_tx, _) = watch::channel(Session::unknown());
        Self {
            auth,
            fsm: Mutex::new(SessionMachine::new()),
            session_tx,
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            transition_lock: Mutex::new(()),
            listener_started: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Session {
        self.session_tx.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.session_tx.borrow().status
    }

    pub fn user_id(&self) -> Option<String> {
        self.session_tx.borrow().user_id.clone()
    }

    /// Receiver that always holds the latest session.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    /// Register `observer` for every future transition.
    ///
    /// Observers run synchronously, in transition order, before the operation
    /// that caused the transition returns. They run under the transition lock,
    /// so they must not block and must not call back into the manager
    /// (`sign_in`, `sign_out`, `restore`, `handle_change`); doing so deadlocks.
    /// Reading `current()` or `status()` is fine: the new value is already
    /// published when observers run.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SessionTransition) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Drive the FSM with `input` and, if the session value changed, publish it.
    ///
    /// Returns `None` when the input is not legal in the current state or the
    /// resulting session equals the previous one.
    fn apply(
        &self,
        input: SessionMachineInput,
        next: Session,
        cause: TransitionCause,
    ) -> Option<SessionTransition> {
        let _transition = self.transition_lock.lock();

        {
            let mut fsm = self.fsm.lock();
            if fsm.consume(&input).is_err() {
                debug!(
                    input = ?input,
                    state = ?fsm.state(),
                    cause = ?cause,
                    "Session input ignored in current state"
                );
                return None;
            }
        }

        let previous = self.session_tx.send_replace(next.clone());
        if previous == next {
            return None;
        }

        info!(
            old_status = ?previous.status,
            new_status = ?next.status,
            user_id = next.user_id().unwrap_or(""),
            cause = ?cause,
            "Session transition"
        );

        let transition = SessionTransition {
            previous,
            current: next,
            cause,
        };
        let observers: Vec<SessionObserver> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(&transition);
        }

        Some(transition)
    }

    /// Resolve the initial status from the auth service's current session.
    ///
    /// Has no effect on the status if a notification already resolved it.
    pub async fn restore(&self) -> SessionResult<Session> {
        match self.auth.current_session().await {
            Ok(Some(remote)) => {
                self.apply(
                    SessionMachineInput::SessionRestored,
                    Session::authenticated(&remote),
                    TransitionCause::Restore,
                );
            }
            Ok(None) => {
                self.apply(
                    SessionMachineInput::NoSession,
                    Session::unauthenticated(),
                    TransitionCause::Restore,
                );
            }
            Err(e) => {
                warn!(error = %e, "Session restore failed");
                self.apply(
                    SessionMachineInput::NoSession,
                    Session::unauthenticated(),
                    TransitionCause::Restore,
                );
                return Err(SessionError::RestoreFailed(e));
            }
        }
        Ok(self.current())
    }

    /// Wait until the status is no longer `Unknown`.
    pub async fn wait_until_resolved(&self) -> Session {
        let mut rx = self.watch();
        let session = match rx.wait_for(|session| session.status.is_resolved()).await {
            Ok(session) => session.clone(),
            // The sender lives in `self`, so this is unreachable while borrowed.
            Err(_) => self.current(),
        };
        session
    }

    fn validate(credentials: &Credentials) -> SessionResult<()> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(SessionError::ValidationFailed(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Sign in with email and password.
    ///
    /// On failure the session is left as it was. No retry.
    pub async fn sign_in(&self, credentials: &Credentials) -> SessionResult<Session> {
        Self::validate(credentials)?;

        let remote = self.auth.sign_in(credentials).await.map_err(|e| {
            warn!(error = %e, "Sign-in rejected");
            SessionError::AuthFailed(e)
        })?;

        self.apply(
            SessionMachineInput::SessionStarted,
            Session::authenticated(&remote),
            TransitionCause::SignIn,
        );
        Ok(self.current())
    }

    /// Create an identity. Never transitions by itself; an immediately
    /// signed-in identity arrives as a notification.
    pub async fn sign_up(&self, credentials: &Credentials) -> SessionResult<()> {
        Self::validate(credentials)?;

        self.auth.sign_up(credentials).await.map_err(|e| {
            warn!(error = %e, "Sign-up rejected");
            SessionError::AuthFailed(e)
        })?;
        info!("Sign-up accepted");
        Ok(())
    }

    /// Sign out. The local session is dropped even if the remote call fails;
    /// that failure is still returned.
    pub async fn sign_out(&self) -> SessionResult<()> {
        let result = self.auth.sign_out().await;

        self.apply(
            SessionMachineInput::SessionEnded,
            Session::unauthenticated(),
            TransitionCause::SignOut,
        );

        result.map_err(|e| {
            warn!(error = %e, "Remote sign-out failed");
            SessionError::AuthFailed(e)
        })
    }

    /// Apply one session-change notification.
    pub fn handle_change(&self, change: &SessionChange) -> Option<SessionTransition> {
        let cause = TransitionCause::Notification(change.event);
        match &change.session {
            Some(remote) => self.apply(
                SessionMachineInput::SessionStarted,
                Session::authenticated(remote),
                cause,
            ),
            None => self.apply(
                SessionMachineInput::SessionEnded,
                Session::unauthenticated(),
                cause,
            ),
        }
    }

    /// Apply every notification from `changes`, in order, until it closes.
    pub async fn listen(&self, mut changes: mpsc::UnboundedReceiver<SessionChange>) {
        while let Some(change) = changes.recv().await {
            self.handle_change(&change);
        }
        debug!("Session change stream closed");
    }

    /// Subscribe to the auth service's notifications and apply them on a
    /// background task. Only one listener may be started per manager.
    ///
    /// The subscription is opened before this returns, so no notification
    /// emitted afterwards is missed.
    pub fn spawn_listener(self: &Arc<Self>) -> SessionResult<JoinHandle<()>> {
        if self.listener_started.swap(true, Ordering::SeqCst) {
            return Err(SessionError::ListenerAlreadyStarted);
        }

        let mut changes = self.auth.session_changes();
        let manager = Arc::downgrade(self);
        Ok(tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_change(&change);
            }
            debug!("Session listener stopped");
        }))
    }
}
