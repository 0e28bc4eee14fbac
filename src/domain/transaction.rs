//! Transaction domain entity and status vocabulary.
//! Framework-agnostic; the union of the cashier, deposit and withdrawal
//! front-end status sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical transaction status.
///
/// Ordered forward: `Pending -> Assigned -> InProgress -> RequiresAdminReview
/// -> terminal`. A transition is only accepted when its rank is strictly
/// greater than the current one; terminal statuses all share the top rank, so
/// once one is applied no other status can replace it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Assigned,
    InProgress,
    RequiresAdminReview,
    Completed,
    CompletedWithAdjustment,
    Rejected,
    Cancelled,
    Failed,
    Reverted,
}

impl TxStatus {
    pub fn rank(&self) -> u8 {
        match self {
            TxStatus::Pending => 1,
            TxStatus::Assigned => 2,
            TxStatus::InProgress => 3,
            TxStatus::RequiresAdminReview => 4,
            TxStatus::Completed
            | TxStatus::CompletedWithAdjustment
            | TxStatus::Rejected
            | TxStatus::Cancelled
            | TxStatus::Failed
            | TxStatus::Reverted => 5,
        }
    }

    /// `RequiresAdminReview` keeps the tracker listening for a real terminal,
    /// so it is deliberately non-terminal here.
    pub fn is_terminal(&self) -> bool {
        self.rank() == 5
    }

    pub fn is_forward_of(&self, current: &TxStatus) -> bool {
        self.rank() > current.rank()
    }

    /// UI-facing status. End users must never see `requires_admin_review`;
    /// it is remapped to `pending` by policy.
    pub fn display(&self) -> TxStatus {
        match self {
            TxStatus::RequiresAdminReview => TxStatus::Pending,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Assigned => "assigned",
            TxStatus::InProgress => "in_progress",
            TxStatus::RequiresAdminReview => "requires_admin_review",
            TxStatus::Completed => "completed",
            TxStatus::CompletedWithAdjustment => "completed_with_adjustment",
            TxStatus::Rejected => "rejected",
            TxStatus::Cancelled => "cancelled",
            TxStatus::Failed => "failed",
            TxStatus::Reverted => "reverted",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "assigned" => Ok(TxStatus::Assigned),
            "in_progress" => Ok(TxStatus::InProgress),
            "requires_admin_review" => Ok(TxStatus::RequiresAdminReview),
            "completed" => Ok(TxStatus::Completed),
            "completed_with_adjustment" => Ok(TxStatus::CompletedWithAdjustment),
            "rejected" => Ok(TxStatus::Rejected),
            "cancelled" => Ok(TxStatus::Cancelled),
            "failed" => Ok(TxStatus::Failed),
            "reverted" => Ok(TxStatus::Reverted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

/// Locally tracked transaction.
///
/// `id` is backend-assigned and absent while the transaction is provisional
/// (created optimistically before the creation acknowledgement arrives).
/// Amounts are integer minor currency units; money never goes through
/// floating point.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Option<String>,
    pub amount: i64,
    pub status: TxStatus,
    pub counterparty: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Backend-specific fields (payment details, rejection reasons). The
    /// tracker stores and forwards these, never interprets them.
    pub payload: serde_json::Value,
}

impl Transaction {
    /// Provisional placeholder created the instant a create-request is sent.
    pub fn provisional(amount: i64, details: serde_json::Value) -> Self {
        Self {
            id: None,
            amount,
            status: TxStatus::Pending,
            counterparty: None,
            created_at: Utc::now(),
            payload: details,
        }
    }

    /// Transaction synthesized from an event when no local state exists for
    /// the id (the create acknowledgement was lost or arrived out of order).
    pub fn from_event(id: &str, status: TxStatus, payload: serde_json::Value) -> Self {
        let amount = payload.get("amount").and_then(|v| v.as_i64()).unwrap_or(0);
        let mut tx = Self {
            id: Some(id.to_string()),
            amount,
            status,
            counterparty: None,
            created_at: Utc::now(),
            payload: serde_json::Value::Null,
        };
        tx.absorb_payload(payload);
        tx
    }

    /// Shallow-merges an event payload into the stored bag and picks up the
    /// assigned counterparty if the backend included one.
    pub fn absorb_payload(&mut self, payload: serde_json::Value) {
        if let Some(agent) = payload
            .get("cashier")
            .or_else(|| payload.get("counterparty"))
            .and_then(|v| v.as_str())
        {
            self.counterparty = Some(agent.to_string());
        }

        match (&mut self.payload, payload) {
            (_, serde_json::Value::Null) => {}
            (serde_json::Value::Object(existing), serde_json::Value::Object(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
            (slot, incoming) => *slot = incoming,
        }
    }

    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            id: self.id.clone(),
            amount: self.amount,
            display_amount: format_minor_units(self.amount),
            status: self.status.display(),
            counterparty: self.counterparty.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// What the Screen Driver receives. `status` is already display-remapped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSnapshot {
    pub id: Option<String>,
    pub amount: i64,
    pub display_amount: String,
    pub status: TxStatus,
    pub counterparty: Option<String>,
    pub payload: serde_json::Value,
}

/// Formats an integer minor-unit amount as a decimal string ("5000" -> "50.00").
pub fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_order_is_forward_only() {
        assert!(TxStatus::Assigned.is_forward_of(&TxStatus::Pending));
        assert!(TxStatus::InProgress.is_forward_of(&TxStatus::Assigned));
        assert!(TxStatus::Completed.is_forward_of(&TxStatus::InProgress));
        assert!(!TxStatus::Pending.is_forward_of(&TxStatus::Pending));
        assert!(!TxStatus::Assigned.is_forward_of(&TxStatus::Completed));
        // terminals share a rank, so no terminal replaces another
        assert!(!TxStatus::Completed.is_forward_of(&TxStatus::Cancelled));
    }

    #[test]
    fn terminal_set_excludes_admin_review() {
        assert!(TxStatus::Completed.is_terminal());
        assert!(TxStatus::CompletedWithAdjustment.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
        assert!(TxStatus::Cancelled.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::Reverted.is_terminal());
        assert!(!TxStatus::RequiresAdminReview.is_terminal());
        assert!(!TxStatus::Pending.is_terminal());
    }

    #[test]
    fn admin_review_displays_as_pending() {
        assert_eq!(TxStatus::RequiresAdminReview.display(), TxStatus::Pending);
        assert_eq!(TxStatus::InProgress.display(), TxStatus::InProgress);
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in [
            TxStatus::Pending,
            TxStatus::Assigned,
            TxStatus::InProgress,
            TxStatus::RequiresAdminReview,
            TxStatus::Completed,
            TxStatus::CompletedWithAdjustment,
            TxStatus::Rejected,
            TxStatus::Cancelled,
            TxStatus::Failed,
            TxStatus::Reverted,
        ] {
            assert_eq!(status.as_str().parse::<TxStatus>(), Ok(status));
        }
        assert!("refunded".parse::<TxStatus>().is_err());
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_minor_units(5000), "50.00");
        assert_eq!(format_minor_units(5), "0.05");
        assert_eq!(format_minor_units(0), "0.00");
        assert_eq!(format_minor_units(-1250), "-12.50");
    }

    #[test]
    fn absorb_payload_picks_up_cashier() {
        let mut tx = Transaction::provisional(1000, json!({"method": "card"}));
        tx.absorb_payload(json!({"cashier": "agent-7", "card_mask": "1234"}));

        assert_eq!(tx.counterparty.as_deref(), Some("agent-7"));
        assert_eq!(tx.payload["method"], "card");
        assert_eq!(tx.payload["card_mask"], "1234");
    }

    #[test]
    fn snapshot_remaps_display_status() {
        let mut tx = Transaction::provisional(5000, serde_json::Value::Null);
        tx.status = TxStatus::RequiresAdminReview;

        let snap = tx.snapshot();
        assert_eq!(snap.status, TxStatus::Pending);
        assert_eq!(snap.display_amount, "50.00");
    }

    #[test]
    fn synthesized_transaction_reads_amount_from_payload() {
        let tx = Transaction::from_event(
            "T9",
            TxStatus::Completed,
            json!({"amount": 7500, "cashier": "agent-1"}),
        );

        assert_eq!(tx.id.as_deref(), Some("T9"));
        assert_eq!(tx.amount, 7500);
        assert_eq!(tx.counterparty.as_deref(), Some("agent-1"));
    }
}
