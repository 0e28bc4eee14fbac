//! Local input validation. Failures here are rejected before any network
//! call and surfaced immediately; there is nothing to retry.

use std::fmt;

use crate::ports::CreateRequest;

pub const AMOUNT_MIN: i64 = 1;
pub const AMOUNT_MAX: i64 = 100_000_000;
pub const DETAIL_VALUE_MAX_LEN: usize = 256;
pub const DETAIL_FIELD_MAX_COUNT: usize = 32;
pub const REASON_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Strips control characters and collapses whitespace runs.
pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Amounts are integer minor currency units, strictly positive and bounded.
pub fn validate_amount(amount: i64) -> ValidationResult {
    if amount < AMOUNT_MIN {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    if amount > AMOUNT_MAX {
        return Err(ValidationError::new(
            "amount",
            format!("must be at most {} minor units", AMOUNT_MAX),
        ));
    }

    Ok(())
}

/// Validates a create request before it leaves the client: amount bounds plus
/// shape and size limits on the free-form payment details.
pub fn validate_create(request: &CreateRequest) -> ValidationResult {
    validate_amount(request.amount)?;

    match &request.details {
        serde_json::Value::Null => Ok(()),
        serde_json::Value::Object(fields) => {
            if fields.len() > DETAIL_FIELD_MAX_COUNT {
                return Err(ValidationError::new(
                    "details",
                    format!("must have at most {} fields", DETAIL_FIELD_MAX_COUNT),
                ));
            }

            for (key, value) in fields {
                if let serde_json::Value::String(s) = value {
                    if sanitize_string(s).is_empty() && !s.is_empty() {
                        return Err(ValidationError::new(
                            "details",
                            format!("field '{}' must not be blank", key),
                        ));
                    }
                    if s.len() > DETAIL_VALUE_MAX_LEN {
                        return Err(ValidationError::new(
                            "details",
                            format!("field '{}' exceeds {} characters", key, DETAIL_VALUE_MAX_LEN),
                        ));
                    }
                }
            }

            Ok(())
        }
        _ => Err(ValidationError::new(
            "details",
            "must be an object or omitted",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_amount_bounds() {
        assert!(validate_amount(5000).is_ok());
        assert!(validate_amount(AMOUNT_MIN).is_ok());
        assert!(validate_amount(AMOUNT_MAX).is_ok());
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-100).is_err());
        assert!(validate_amount(AMOUNT_MAX + 1).is_err());
    }

    #[test]
    fn validates_create_request() {
        let ok = CreateRequest::new(5000, json!({"method": "card", "account": "40817..."}));
        assert!(validate_create(&ok).is_ok());

        let no_details = CreateRequest::new(5000, serde_json::Value::Null);
        assert!(validate_create(&no_details).is_ok());

        let bad_amount = CreateRequest::new(0, serde_json::Value::Null);
        assert!(validate_create(&bad_amount).is_err());

        let bad_shape = CreateRequest::new(5000, json!(["not", "an", "object"]));
        assert!(validate_create(&bad_shape).is_err());

        let oversized = CreateRequest::new(5000, json!({"note": "x".repeat(300)}));
        assert!(validate_create(&oversized).is_err());
    }
}
