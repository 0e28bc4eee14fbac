//! Tracker error taxonomy.
//!
//! Five classes, none fatal: connectivity failures retry with bounded backoff
//! and surface only on exhaustion; protocol/ordering anomalies are absorbed
//! silently by the state machine and only logged; validation failures reject
//! before any network call; business rejections surface verbatim; timeouts
//! are backend-driven and explained as inactivity cancellation. Every path
//! ends on a screen the user can act on.

use thiserror::Error;

use crate::ports::ApiError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("another transaction is already active")]
    AlreadyActive,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("connectivity failure: {0}")]
    Connectivity(String),
}

impl From<ApiError> for TrackerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => TrackerError::Rejected(message),
            ApiError::NotFound => TrackerError::Rejected("transaction not found".to_string()),
            other => TrackerError::Connectivity(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_backend_rejection_verbatim() {
        let err = TrackerError::from(ApiError::Rejected("limit exceeded".to_string()));
        assert!(matches!(err, TrackerError::Rejected(ref m) if m == "limit exceeded"));
    }

    #[test]
    fn maps_transport_failures_to_connectivity() {
        let err = TrackerError::from(ApiError::Unavailable("circuit open".to_string()));
        assert!(matches!(err, TrackerError::Connectivity(_)));
    }
}
