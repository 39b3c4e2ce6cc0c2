//! Fan-out of session-change notifications to any number of receivers.

use crate::types::SessionChange;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Ordered, lossless broadcast of [`SessionChange`]s.
///
/// Unbounded per-receiver queues: a slow receiver never causes another to
/// miss or coalesce notifications. Closed receivers are pruned on the next emit.
#[derive(Default)]
pub struct SessionNotifier {
    senders: Mutex<Vec<mpsc::UnboundedSender<SessionChange>>>,
}

impl SessionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    /// Deliver `change` to every open receiver.
    pub fn emit(&self, change: SessionChange) {
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        senders.retain(|tx| tx.send(change.clone()).is_ok());
        tracing::debug!(
            event = ?change.event,
            receivers = senders.len(),
            "session change emitted"
        );
    }

    pub fn receiver_count(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionEvent;

    #[test]
    fn test_every_receiver_sees_every_change_in_order() {
        let notifier = SessionNotifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.emit(SessionChange::signed_out());
        notifier.emit(SessionChange::expired());

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap().event, SessionEvent::SignedOut);
            assert_eq!(rx.try_recv().unwrap().event, SessionEvent::SessionExpired);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_closed_receivers_are_pruned() {
        let notifier = SessionNotifier::new();
        let rx = notifier.subscribe();
        let _keep = notifier.subscribe();
        drop(rx);

        notifier.emit(SessionChange::signed_out());
        assert_eq!(notifier.receiver_count(), 1);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_changes() {
        let notifier = SessionNotifier::new();
        notifier.emit(SessionChange::signed_out());

        let mut rx = notifier.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
