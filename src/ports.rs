//! Trait boundaries between the tracker and its external collaborators.
//! The backend owns all business rules; the UI shell owns the DOM. The
//! tracker reaches both only through these contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TransactionSnapshot, TxStatus};

/// Screens the tracker can ask the shell to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Idle screen with the request form.
    Main,
    /// Transaction created, waiting for assignment/processing.
    Waiting,
    /// Counterparty is actively processing.
    InProcess,
    /// Terminal success.
    Completed,
    /// Terminal rejection/cancellation/failure, or a local error.
    Failure,
    /// Event source retries exhausted; actionable connectivity error.
    ConnectionLost,
}

/// Request to open a new transaction.
///
/// `idempotency_key` is generated client-side so a retried create cannot open
/// two backend transactions.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
    pub amount: i64,
    pub details: serde_json::Value,
    pub idempotency_key: String,
}

impl CreateRequest {
    pub fn new(amount: i64, details: serde_json::Value) -> Self {
        Self {
            amount,
            details,
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }
}

/// Backend's creation acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAck {
    pub id: String,
    pub status: TxStatus,
}

/// Authoritative status fetched during reconciliation or polling.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSnapshot {
    pub status: TxStatus,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("transaction not found")]
    NotFound,

    #[error("request rejected by backend: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response from backend: {0}")]
    InvalidResponse(String),
}

/// Network collaborator. All calls are async and non-blocking; results that
/// resolve after the user has moved on are discarded by the tracker's
/// current-id guard, so implementations never need to cancel in-flight work.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn create_transaction(&self, request: &CreateRequest) -> Result<CreateAck, ApiError>;

    async fn fetch_status(&self, id: &str) -> Result<StatusSnapshot, ApiError>;

    async fn cancel(&self, id: &str, reason: &str) -> Result<(), ApiError>;
}

/// Rendering boundary. Exactly one operation; the driver never queries DOM
/// state, never owns timers and never decides business transitions, which is
/// what keeps the tracker testable without a DOM.
pub trait ScreenDriver: Send + Sync {
    fn render(&self, screen: Screen, transaction: Option<&TransactionSnapshot>, note: Option<&str>);
}
