//! Reconnection and reconciliation policy.
//!
//! Reconnect attempts are capped with a lightly increasing delay; exhausting
//! them is reported to the user as a connectivity failure instead of an
//! indefinite silent retry. Reconciliation decisions (whether a freshly
//! fetched authoritative status beats locally-held optimistic state) reuse
//! the same forward-order rules as the state machine.

use std::time::Duration;

use crate::domain::TxStatus;

/// Bounded reconnect schedule. One policy for all three front-end variants;
/// the source front-ends disagreed on parameters, so the most defensive set
/// is the default and the rest is configuration.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            factor: 1.2,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `failed_attempts` consecutive
    /// failures (1-based). `None` once the cap is reached.
    pub fn delay_for(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts >= self.max_attempts {
            return None;
        }

        let millis = self.base_delay.as_millis() as f64
            * self.factor.powi(failed_attempts.saturating_sub(1) as i32);
        Some(Duration::from_millis(millis as u64).min(self.max_delay))
    }
}

/// What to do with a status fetched during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAction {
    /// Fetched status is forward of the local one: apply it exactly as if it
    /// had arrived live.
    Apply,
    /// Local state is already at or past the fetched status; a stale fetch
    /// never regresses it.
    KeepLocal,
}

pub fn fetched_status_action(local: TxStatus, fetched: TxStatus) -> FetchAction {
    if fetched.is_forward_of(&local) {
        FetchAction::Apply
    } else {
        FetchAction::KeepLocal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_increases_up_to_cap() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(2400)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(2880)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(3456)));
        assert_eq!(policy.delay_for(5), None);
    }

    #[test]
    fn delay_never_exceeds_ceiling() {
        let policy = ReconnectPolicy {
            max_attempts: 50,
            base_delay: Duration::from_secs(2),
            factor: 1.5,
            max_delay: Duration::from_secs(10),
        };

        for attempt in 1..50 {
            let delay = policy.delay_for(attempt).unwrap();
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn fetched_terminal_beats_local_non_terminal() {
        assert_eq!(
            fetched_status_action(TxStatus::Pending, TxStatus::Cancelled),
            FetchAction::Apply
        );
        assert_eq!(
            fetched_status_action(TxStatus::InProgress, TxStatus::Completed),
            FetchAction::Apply
        );
    }

    #[test]
    fn fetched_status_never_regresses_local() {
        assert_eq!(
            fetched_status_action(TxStatus::Completed, TxStatus::InProgress),
            FetchAction::KeepLocal
        );
        assert_eq!(
            fetched_status_action(TxStatus::InProgress, TxStatus::InProgress),
            FetchAction::KeepLocal
        );
        // terminals share a rank, so one terminal never replaces another
        assert_eq!(
            fetched_status_action(TxStatus::Cancelled, TxStatus::Completed),
            FetchAction::KeepLocal
        );
    }
}
