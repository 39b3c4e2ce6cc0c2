//! Authentication gate for BookHive.
//!
//! This crate provides:
//! - An explicit FSM for the session status (`Unknown`, `Unauthenticated`, `Authenticated`)
//! - `SessionManager`, which restores, signs in/up/out and applies session-change
//!   notifications, publishing each transition to observers and `watch` receivers

mod error;
mod session;
mod session_fsm;

#[cfg(test)]
mod tests;

pub use error::{SessionError, SessionResult};
pub use session::{SessionManager, SessionObserver, SessionTransition, SubscriptionId};
pub use session_fsm::session_machine;
pub use session_fsm::{
    Session, SessionMachine, SessionMachineInput, SessionMachineState, SessionStatus,
    TransitionCause,
};
