//! Mock payment gateway for testing.
//!
//! Provides a scriptable implementation of `PaymentGateway` for unit and
//! integration tests. Supports:
//! - Idempotent creation keyed by `PaymentId`
//! - Scripted statuses and amounts
//! - Error injection
//! - Call tracking
//! - Artificial latency for timeout tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{Money, PaymentId};
use crate::domain::subscription::ObservedStatus;
use crate::ports::{
    CreatePaymentRequest, GatewayError, GatewayMetadata, GatewayPayment, GatewayPaymentStatus,
    PaymentGateway,
};

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// let created = gateway.create_payment(request).await?;
///
/// // The user paid
/// gateway.set_status(&created.gateway_payment_id, ObservedStatus::Succeeded);
///
/// // Or the provider is down
/// gateway.set_method_error("get_status", GatewayError::network("reset"));
/// ```
#[derive(Default)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Charges by gateway id.
    payments: HashMap<String, GatewayPaymentStatus>,

    /// Idempotency keys already seen.
    by_key: HashMap<PaymentId, String>,

    /// Status a charge moves to when captured. Defaults to `Succeeded`.
    capture_result: Option<ObservedStatus>,

    /// Error to return on next call.
    next_error: Option<GatewayError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, GatewayError>,

    /// Delay applied to every call.
    latency: Option<Duration>,

    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Moves a known charge to `status`.
    pub fn set_status(&self, gateway_payment_id: &str, status: ObservedStatus) {
        if let Some(payment) = self.state().payments.get_mut(gateway_payment_id) {
            payment.status = status;
        }
    }

    /// Overrides the amount the gateway reports for a charge.
    pub fn set_amount(&self, gateway_payment_id: &str, amount: Money) {
        if let Some(payment) = self.state().payments.get_mut(gateway_payment_id) {
            payment.amount = amount;
        }
    }

    /// Registers a charge the gateway knows about but we may not.
    pub fn add_payment(&self, payment: GatewayPaymentStatus) {
        let id = payment.gateway_payment_id.clone();
        self.state().payments.insert(id, payment);
    }

    /// Status a charge lands in after `capture`.
    pub fn set_capture_result(&self, status: ObservedStatus) {
        self.state().capture_result = Some(status);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: GatewayError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), GatewayError> {
        let latency = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
            });
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();

        // Check method-specific error first
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Check global error (consumes it)
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }

    fn update_status(
        &self,
        gateway_payment_id: &str,
        status: ObservedStatus,
    ) -> Result<(), GatewayError> {
        let mut state = self.state();
        let payment = state
            .payments
            .get_mut(gateway_payment_id)
            .ok_or_else(|| GatewayError::not_found("Payment"))?;
        payment.status = status;
        Ok(())
    }
}

impl Clone for MockPaymentGateway {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        self.enter(
            "create_payment",
            vec![request.payment_id.to_string(), request.amount.to_string()],
        )
        .await?;

        let mut state = self.state();

        let gateway_payment_id = match state.by_key.get(&request.payment_id) {
            Some(existing) => existing.clone(),
            None => {
                let id = format!("gw-{}", request.payment_id);
                state.by_key.insert(request.payment_id, id.clone());
                state.payments.insert(
                    id.clone(),
                    GatewayPaymentStatus {
                        gateway_payment_id: id.clone(),
                        status: ObservedStatus::Pending,
                        amount: request.amount,
                        metadata: GatewayMetadata {
                            user_id: Some(request.user_id),
                            internal_payment_id: Some(request.payment_id),
                        },
                    },
                );
                id
            }
        };

        Ok(GatewayPayment {
            confirmation_url: Some(format!("https://pay.mock/confirm/{}", gateway_payment_id)),
            gateway_payment_id,
        })
    }

    async fn get_status(
        &self,
        gateway_payment_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        self.enter("get_status", vec![gateway_payment_id.to_string()])
            .await?;

        self.state()
            .payments
            .get(gateway_payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("Payment"))
    }

    async fn cancel(&self, gateway_payment_id: &str) -> Result<(), GatewayError> {
        self.enter("cancel", vec![gateway_payment_id.to_string()])
            .await?;
        self.update_status(gateway_payment_id, ObservedStatus::Canceled)
    }

    async fn capture(&self, gateway_payment_id: &str) -> Result<(), GatewayError> {
        self.enter("capture", vec![gateway_payment_id.to_string()])
            .await?;
        let result = self
            .state()
            .capture_result
            .unwrap_or(ObservedStatus::Succeeded);
        self.update_status(gateway_payment_id, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn request(payment_id: PaymentId) -> CreatePaymentRequest {
        CreatePaymentRequest {
            payment_id,
            user_id: UserId::new(77),
            amount: Money::new(50_000, "RUB").unwrap(),
            description: "30 days".to_string(),
        }
    }

    #[tokio::test]
    async fn same_idempotency_key_returns_same_charge() {
        let gateway = MockPaymentGateway::new();
        let payment_id = PaymentId::new();

        let first = gateway.create_payment(request(payment_id)).await.unwrap();
        let second = gateway.create_payment(request(payment_id)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.call_count("create_payment"), 2);
    }

    #[tokio::test]
    async fn new_charge_is_pending_with_metadata() {
        let gateway = MockPaymentGateway::new();
        let payment_id = PaymentId::new();
        let created = gateway.create_payment(request(payment_id)).await.unwrap();

        let status = gateway.get_status(&created.gateway_payment_id).await.unwrap();

        assert_eq!(status.status, ObservedStatus::Pending);
        assert_eq!(status.metadata.internal_payment_id, Some(payment_id));
        assert_eq!(status.metadata.user_id, Some(UserId::new(77)));
    }

    #[tokio::test]
    async fn capture_moves_charge_to_capture_result() {
        let gateway = MockPaymentGateway::new();
        let created = gateway.create_payment(request(PaymentId::new())).await.unwrap();
        gateway.set_status(&created.gateway_payment_id, ObservedStatus::WaitingForCapture);

        gateway.capture(&created.gateway_payment_id).await.unwrap();

        let status = gateway.get_status(&created.gateway_payment_id).await.unwrap();
        assert_eq!(status.status, ObservedStatus::Succeeded);
    }

    #[tokio::test]
    async fn method_error_is_sticky_and_global_error_is_consumed() {
        let gateway = MockPaymentGateway::new();
        gateway.set_method_error("get_status", GatewayError::network("down"));
        gateway.set_error(GatewayError::provider_unavailable("503"));

        assert!(gateway.create_payment(request(PaymentId::new())).await.is_err());
        assert!(gateway.create_payment(request(PaymentId::new())).await.is_ok());
        assert!(gateway.get_status("gw-x").await.is_err());
        assert!(gateway.get_status("gw-x").await.is_err());
    }

    #[tokio::test]
    async fn unknown_charge_is_not_found() {
        let gateway = MockPaymentGateway::new();
        let err = gateway.get_status("gw-missing").await.unwrap_err();
        assert_eq!(err.code, crate::ports::GatewayErrorCode::NotFound);
    }
}
