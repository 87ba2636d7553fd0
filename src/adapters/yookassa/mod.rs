//! YooKassa payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for YooKassa, including:
//! - Payment creation with idempotency keys
//! - Status polling, capture and cancellation
//! - Notification body parsing
//! - Notification signature verification
//!
//! # Security
//!
//! - Signatures use HMAC-SHA256 with constant-time comparison
//! - All secrets are handled via `secrecy::SecretString`

mod api_types;
mod mock_payment_gateway;
mod webhook_verifier;
mod yookassa_gateway;

pub use api_types::{YooKassaAmount, YooKassaNotification, YooKassaPayment, YooKassaRefund};
pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use webhook_verifier::{SignatureError, WebhookVerifier};
pub use yookassa_gateway::{YooKassaConfig, YooKassaGateway};
