//! Reconciliation error taxonomy.
//!
//! # Retry semantics
//!
//! | Error | Retryable |
//! |-------|-----------|
//! | StoreWriteFailure | yes |
//! | StoreUnavailable | yes |
//! | GatewayUnavailable | yes |
//! | LockTimeout | yes |
//! | everything else | no |
//!
//! Transports answer retryable errors with a server error so the provider
//! redelivers; everything else is acknowledged.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, Money, PaymentId, UserId};

/// Errors raised while turning payment events into entitlement changes.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The observation references a payment the store has never seen.
    #[error("Unknown payment: {0}")]
    UnknownPayment(String),

    /// Observed amount differs from the stored one. Needs manual review.
    #[error("Amount mismatch for payment {payment_id}: expected {expected}, observed {observed}")]
    AmountMismatch {
        payment_id: PaymentId,
        expected: Money,
        observed: Money,
    },

    /// Persisting a transition failed after every retry.
    #[error("Store write failed: {0}")]
    StoreWriteFailure(String),

    /// The store could not be read.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Network failure, timeout or 5xx from the payment provider.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The provider refused the request outright.
    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// Invite, ban or unban failed at the channel provider.
    #[error("Access provider failure: {0}")]
    AccessProviderFailure(String),

    /// A webhook arrived without a required metadata field.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// A webhook body could not be interpreted.
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// Webhook or caller claims a payment that belongs to someone else.
    #[error("Payment {payment_id} does not belong to user {claimed}")]
    OwnershipMismatch {
        payment_id: PaymentId,
        claimed: UserId,
    },

    /// The per-user lock was not acquired in time.
    #[error("Timed out waiting for lock on user {0}")]
    LockTimeout(UserId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A domain rule refused the change.
    #[error("{0}")]
    DomainRule(DomainError),
}

impl ReconcileError {
    /// True when the caller (or the provider, via a 5xx) should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::StoreWriteFailure(_)
                | ReconcileError::StoreUnavailable(_)
                | ReconcileError::GatewayUnavailable(_)
                | ReconcileError::LockTimeout(_)
        )
    }

    /// Message safe to show a subscriber.
    pub fn user_message(&self) -> &'static str {
        match self {
            ReconcileError::UnknownPayment(_) | ReconcileError::OwnershipMismatch { .. } => {
                "Payment not found. Please start a new payment."
            }
            ReconcileError::UserNotFound(_) => "Please start the bot first.",
            _ => "Something went wrong. Please try again later.",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ReconcileError::UnknownPayment(_) => ErrorCode::PaymentNotFound,
            ReconcileError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
            ReconcileError::StoreWriteFailure(_) | ReconcileError::StoreUnavailable(_) => {
                ErrorCode::DatabaseError
            }
            ReconcileError::GatewayUnavailable(_) => ErrorCode::GatewayUnavailable,
            ReconcileError::GatewayRejected(_) => ErrorCode::GatewayRejected,
            ReconcileError::AccessProviderFailure(_) => ErrorCode::AccessProviderFailure,
            ReconcileError::MissingMetadata(_) => ErrorCode::MissingMetadata,
            ReconcileError::MalformedNotification(_) => ErrorCode::InvalidFormat,
            ReconcileError::OwnershipMismatch { .. } => ErrorCode::OwnershipMismatch,
            ReconcileError::LockTimeout(_) => ErrorCode::LockTimeout,
            ReconcileError::UserNotFound(_) => ErrorCode::UserNotFound,
            ReconcileError::DomainRule(err) => err.code,
        }
    }

    /// Wraps a failed store read.
    pub fn store_read(err: DomainError) -> Self {
        ReconcileError::StoreUnavailable(err.to_string())
    }

    /// Wraps a failed store write.
    pub fn store_write(err: DomainError) -> Self {
        ReconcileError::StoreWriteFailure(err.to_string())
    }
}

impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::DatabaseError => ReconcileError::StoreWriteFailure(err.to_string()),
            _ => ReconcileError::DomainRule(err),
        }
    }
}

impl From<ReconcileError> for DomainError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::DomainRule(inner) => inner,
            other => DomainError::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rub(minor: i64) -> Money {
        Money::new(minor, "RUB").unwrap()
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(ReconcileError::StoreWriteFailure("x".into()).is_retryable());
        assert!(ReconcileError::GatewayUnavailable("x".into()).is_retryable());
        assert!(ReconcileError::LockTimeout(UserId::new(1)).is_retryable());
    }

    #[test]
    fn permanent_failures_are_not_retryable() {
        assert!(!ReconcileError::UnknownPayment("gw-1".into()).is_retryable());
        assert!(!ReconcileError::MissingMetadata("user_id").is_retryable());
        assert!(!ReconcileError::AmountMismatch {
            payment_id: PaymentId::new(),
            expected: rub(100),
            observed: rub(99),
        }
        .is_retryable());
    }

    #[test]
    fn user_message_never_leaks_details() {
        let err = ReconcileError::StoreWriteFailure("constraint payments_pkey".into());
        assert!(!err.user_message().contains("payments_pkey"));
    }

    #[test]
    fn amount_mismatch_displays_both_amounts() {
        let err = ReconcileError::AmountMismatch {
            payment_id: PaymentId::new(),
            expected: rub(50_000),
            observed: rub(100),
        };
        let text = err.to_string();
        assert!(text.contains("500.00 RUB"));
        assert!(text.contains("1.00 RUB"));
    }

    #[test]
    fn database_domain_errors_become_store_failures() {
        let err: ReconcileError = DomainError::database("upsert payment", "boom").into();
        assert!(matches!(err, ReconcileError::StoreWriteFailure(_)));
    }

    #[test]
    fn rule_violations_keep_their_code() {
        let err: ReconcileError =
            DomainError::new(ErrorCode::InvalidStateTransition, "nope").into();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        let back: DomainError = err.into();
        assert_eq!(back.code, ErrorCode::InvalidStateTransition);
    }
}
