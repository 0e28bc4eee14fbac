//! Single-slot store for the session's active transaction.
//!
//! A client session tracks at most one non-terminal transaction; the slot
//! enforces that by construction. Pure in-memory — a page reload loses it and
//! reconciliation rebuilds from the backend instead.

use crate::domain::{Transaction, TxStatus};

#[derive(Debug, Default)]
pub struct Registry {
    active: Option<Transaction>,
    /// Last retired transaction. Late redeliveries for a finished id must be
    /// recognized and dropped, not mistaken for foreign traffic.
    retired: Option<(String, TxStatus)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&mut self, tx: Transaction) {
        self.active = Some(tx);
    }

    pub fn active(&self) -> Option<&Transaction> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Transaction> {
        self.active.as_mut()
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Clears the slot and records the terminal status for the id so the
    /// terminal stays sticky across redeliveries.
    pub fn retire(&mut self, id: String, status: TxStatus) {
        self.retired = Some((id, status));
        self.active = None;
    }

    pub fn retired_status(&self, id: &str) -> Option<TxStatus> {
        match &self.retired {
            Some((retired_id, status)) if retired_id == id => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_a_single_active_transaction() {
        let mut registry = Registry::new();
        assert!(registry.active().is_none());

        registry.set_active(Transaction::provisional(1000, serde_json::Value::Null));
        assert_eq!(registry.active().unwrap().amount, 1000);

        registry.set_active(Transaction::provisional(2000, serde_json::Value::Null));
        assert_eq!(registry.active().unwrap().amount, 2000);

        registry.clear_active();
        assert!(registry.active().is_none());
    }

    #[test]
    fn retire_clears_slot_and_remembers_terminal() {
        let mut registry = Registry::new();
        let mut tx = Transaction::provisional(1000, serde_json::Value::Null);
        tx.id = Some("T1".to_string());
        registry.set_active(tx);

        registry.retire("T1".to_string(), TxStatus::Completed);

        assert!(registry.active().is_none());
        assert_eq!(registry.retired_status("T1"), Some(TxStatus::Completed));
        assert_eq!(registry.retired_status("T2"), None);
    }
}
