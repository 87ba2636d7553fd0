//! Payment gateway port for the external payment processor.
//!
//! # Design
//!
//! - **Idempotent creation**: the internal `PaymentId` is sent as the
//!   idempotency key, so a retried `create_payment` returns the original
//!   charge instead of a new one.
//! - **Gateway agnostic**: statuses are mapped to `ObservedStatus` before
//!   they leave the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, Money, PaymentId, UserId};
use crate::domain::subscription::ObservedStatus;

/// Port for payment processor integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a charge. Repeating the call with the same `payment_id`
    /// yields the same gateway payment.
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError>;

    /// Current status of a charge.
    async fn get_status(&self, gateway_payment_id: &str)
        -> Result<GatewayPaymentStatus, GatewayError>;

    /// Cancels a charge that has not been captured.
    async fn cancel(&self, gateway_payment_id: &str) -> Result<(), GatewayError>;

    /// Captures an authorized charge.
    async fn capture(&self, gateway_payment_id: &str) -> Result<(), GatewayError>;
}

/// Request to create a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    /// Internal id, used as the idempotency key and echoed in metadata.
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub amount: Money,
    pub description: String,
}

/// A charge accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub gateway_payment_id: String,
    /// Hosted page where the user confirms the payment.
    pub confirmation_url: Option<String>,
}

/// Status report for one charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPaymentStatus {
    pub gateway_payment_id: String,
    pub status: ObservedStatus,
    pub amount: Money,
    pub metadata: GatewayMetadata,
}

/// Metadata we attached at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMetadata {
    pub user_id: Option<UserId>,
    pub internal_payment_id: Option<PaymentId>,
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidRequest, message)
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderUnavailable, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        let code = if err.retryable {
            ErrorCode::GatewayUnavailable
        } else {
            ErrorCode::GatewayRejected
        };
        DomainError::new(code, err.message)
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// The call did not complete within its deadline.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Request was refused as invalid.
    InvalidRequest,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimit,

    /// Provider returned a 5xx.
    ProviderUnavailable,

    /// Response could not be understood.
    InvalidResponse,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::Timeout
                | GatewayErrorCode::RateLimit
                | GatewayErrorCode::ProviderUnavailable
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimit => "rate_limit",
            GatewayErrorCode::ProviderUnavailable => "provider_unavailable",
            GatewayErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}
