//! Lifecycle state machine: classifies incoming transition events against the
//! locally tracked transaction.
//!
//! Networks redeliver and reorder events, so the machine is forward-only and
//! idempotent: backward moves, duplicates and foreign-id events are ignored
//! (logged, never a crash), and a terminal status is sticky for the lifetime
//! of the tracked id. The machine never touches rendering; an accepted
//! transition only names the screen the shell should show.

use crate::domain::{Transaction, TxStatus};
use crate::ports::Screen;

/// What to do with an incoming `(id, status)` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Active transaction is still provisional: adopt the id and apply.
    Promote,
    /// Forward move on the active transaction.
    Advance,
    /// No local state for this id but the signal is terminal and therefore
    /// authoritative: synthesize the transaction rather than drop the event.
    Synthesize,
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Identical transition redelivered; applying it again is a no-op.
    Duplicate,
    /// Would move the status backward in the canonical order.
    Backward,
    /// Event for some other transaction while one is active.
    ForeignId,
    /// The id already reached a terminal status; terminal is sticky.
    AlreadyFinished,
    /// Non-terminal event for an id nothing is tracking.
    Untracked,
}

/// Classifies one event. `retired` is the terminal status previously recorded
/// for this id, if any.
pub fn classify(
    active: Option<&Transaction>,
    retired: Option<TxStatus>,
    id: &str,
    incoming: TxStatus,
) -> Decision {
    if let Some(terminal) = retired {
        if incoming == terminal {
            return Decision::Ignore(IgnoreReason::Duplicate);
        }
        return Decision::Ignore(IgnoreReason::AlreadyFinished);
    }

    match active {
        Some(tx) => match &tx.id {
            Some(active_id) if active_id == id => {
                if incoming == tx.status {
                    Decision::Ignore(IgnoreReason::Duplicate)
                } else if incoming.is_forward_of(&tx.status) {
                    Decision::Advance
                } else {
                    Decision::Ignore(IgnoreReason::Backward)
                }
            }
            Some(_) => Decision::Ignore(IgnoreReason::ForeignId),
            // Creation ack lost or out of order; the session tracks at most
            // one transaction, so the event is ours.
            None => Decision::Promote,
        },
        None => {
            if incoming.is_terminal() {
                Decision::Synthesize
            } else {
                Decision::Ignore(IgnoreReason::Untracked)
            }
        }
    }
}

/// Screen shown for a given (raw) status.
pub fn screen_for(status: TxStatus) -> Screen {
    match status {
        TxStatus::Pending | TxStatus::Assigned | TxStatus::RequiresAdminReview => Screen::Waiting,
        TxStatus::InProgress => Screen::InProcess,
        TxStatus::Completed | TxStatus::CompletedWithAdjustment => Screen::Completed,
        TxStatus::Rejected | TxStatus::Cancelled | TxStatus::Failed | TxStatus::Reverted => {
            Screen::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(id: &str, status: TxStatus) -> Transaction {
        let mut tx = Transaction::provisional(5000, serde_json::Value::Null);
        tx.id = Some(id.to_string());
        tx.status = status;
        tx
    }

    #[test]
    fn accepts_forward_transition() {
        let tx = active("T1", TxStatus::Pending);
        assert_eq!(
            classify(Some(&tx), None, "T1", TxStatus::InProgress),
            Decision::Advance
        );
    }

    #[test]
    fn rejects_backward_transition() {
        let tx = active("T1", TxStatus::InProgress);
        assert_eq!(
            classify(Some(&tx), None, "T1", TxStatus::Assigned),
            Decision::Ignore(IgnoreReason::Backward)
        );
    }

    #[test]
    fn duplicate_delivery_is_a_noop() {
        let tx = active("T1", TxStatus::InProgress);
        assert_eq!(
            classify(Some(&tx), None, "T1", TxStatus::InProgress),
            Decision::Ignore(IgnoreReason::Duplicate)
        );
    }

    #[test]
    fn foreign_id_never_overwrites_active() {
        let tx = active("T1", TxStatus::Pending);
        assert_eq!(
            classify(Some(&tx), None, "T2", TxStatus::Completed),
            Decision::Ignore(IgnoreReason::ForeignId)
        );
    }

    #[test]
    fn terminal_is_sticky_after_retirement() {
        assert_eq!(
            classify(None, Some(TxStatus::Completed), "T1", TxStatus::Assigned),
            Decision::Ignore(IgnoreReason::AlreadyFinished)
        );
        assert_eq!(
            classify(None, Some(TxStatus::Completed), "T1", TxStatus::Completed),
            Decision::Ignore(IgnoreReason::Duplicate)
        );
    }

    #[test]
    fn provisional_adopts_event_id() {
        let tx = Transaction::provisional(5000, serde_json::Value::Null);
        assert_eq!(
            classify(Some(&tx), None, "T1", TxStatus::Completed),
            Decision::Promote
        );
    }

    #[test]
    fn untracked_terminal_is_synthesized_not_dropped() {
        assert_eq!(
            classify(None, None, "T9", TxStatus::Completed),
            Decision::Synthesize
        );
        assert_eq!(
            classify(None, None, "T9", TxStatus::Assigned),
            Decision::Ignore(IgnoreReason::Untracked)
        );
    }

    #[test]
    fn screens_follow_status() {
        assert_eq!(screen_for(TxStatus::Pending), Screen::Waiting);
        assert_eq!(screen_for(TxStatus::Assigned), Screen::Waiting);
        assert_eq!(screen_for(TxStatus::RequiresAdminReview), Screen::Waiting);
        assert_eq!(screen_for(TxStatus::InProgress), Screen::InProcess);
        assert_eq!(screen_for(TxStatus::Completed), Screen::Completed);
        assert_eq!(
            screen_for(TxStatus::CompletedWithAdjustment),
            Screen::Completed
        );
        assert_eq!(screen_for(TxStatus::Cancelled), Screen::Failure);
        assert_eq!(screen_for(TxStatus::Reverted), Screen::Failure);
    }
}
