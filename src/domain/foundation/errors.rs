//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidFormat,
    MissingMetadata,

    // Not found errors
    UserNotFound,
    PaymentNotFound,

    // State errors
    InvalidStateTransition,
    AlreadyProcessed,
    AmountMismatch,
    OwnershipMismatch,

    // External collaborators
    GatewayUnavailable,
    GatewayRejected,
    AccessProviderFailure,

    // Infrastructure errors
    LockTimeout,
    DatabaseError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::MissingMetadata => "MISSING_METADATA",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::AlreadyProcessed => "ALREADY_PROCESSED",
            ErrorCode::AmountMismatch => "AMOUNT_MISMATCH",
            ErrorCode::OwnershipMismatch => "OWNERSHIP_MISMATCH",
            ErrorCode::GatewayUnavailable => "GATEWAY_UNAVAILABLE",
            ErrorCode::GatewayRejected => "GATEWAY_REJECTED",
            ErrorCode::AccessProviderFailure => "ACCESS_PROVIDER_FAILURE",
            ErrorCode::LockTimeout => "LOCK_TIMEOUT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Creates a database error with the failing operation as context.
    pub fn database(operation: &str, cause: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DatabaseError,
            format!("Failed to {}: {}", operation, cause),
        )
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::InvalidFormat { field, .. }
                if field == "state_transition" =>
            {
                DomainError::new(ErrorCode::InvalidStateTransition, err.to_string())
            }
            _ => DomainError::new(ErrorCode::ValidationFailed, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("currency");
        assert_eq!(format!("{}", err), "Field 'currency' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("duration_days", 1, 366, 0);
        assert_eq!(
            format!("{}", err),
            "Field 'duration_days' must be between 1 and 366, got 0"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::PaymentNotFound, "Payment not found");
        assert_eq!(format!("{}", err), "[PAYMENT_NOT_FOUND] Payment not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::DatabaseError, "write failed")
            .with_detail("table", "payments");
        assert_eq!(err.details.get("table"), Some(&"payments".to_string()));
    }

    #[test]
    fn database_helper_names_operation() {
        let err = DomainError::database("upsert user", "connection reset");
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message(), "Failed to upsert user: connection reset");
    }

    #[test]
    fn state_transition_validation_maps_to_transition_code() {
        let err: DomainError =
            ValidationError::invalid_format("state_transition", "Cannot transition").into();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn other_validation_maps_to_validation_failed() {
        let err: DomainError = ValidationError::empty_field("currency").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
