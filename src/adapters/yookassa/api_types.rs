//! YooKassa API wire types.
//!
//! Only the fields this crate reads or writes are modelled; unknown fields
//! are ignored on deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::application::handlers::subscription::{WebhookMetadata, WebhookPayload};
use crate::domain::foundation::{Money, ValidationError};
use crate::domain::subscription::ReconcileError;

/// Metadata key carrying our internal payment id.
pub const METADATA_PAYMENT_ID: &str = "bot_payment_id";

/// Metadata key carrying the subscriber id.
pub const METADATA_USER_ID: &str = "user_id";

/// Amount as YooKassa sends it: a decimal string and a currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YooKassaAmount {
    pub value: String,
    pub currency: String,
}

impl YooKassaAmount {
    pub fn from_money(money: &Money) -> Self {
        Self {
            value: money.to_decimal_string(),
            currency: money.currency().to_string(),
        }
    }

    pub fn to_money(&self) -> Result<Money, ValidationError> {
        Money::parse_decimal(&self.value, &self.currency)
    }
}

/// Body of `POST /payments`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentBody {
    pub amount: YooKassaAmount,
    pub confirmation: ConfirmationRequest,
    pub capture: bool,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    #[serde(rename = "type")]
    pub confirmation_type: String,
    pub return_url: String,
}

impl ConfirmationRequest {
    pub fn redirect(return_url: impl Into<String>) -> Self {
        Self {
            confirmation_type: "redirect".to_string(),
            return_url: return_url.into(),
        }
    }
}

/// Payment object returned by the API and embedded in notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct YooKassaPayment {
    pub id: String,
    pub status: String,
    pub amount: YooKassaAmount,
    #[serde(default)]
    pub confirmation: Option<ConfirmationResponse>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationResponse {
    #[serde(default)]
    pub confirmation_url: Option<String>,
}

/// Refund object embedded in `refund.*` notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct YooKassaRefund {
    pub id: String,
    pub payment_id: String,
    pub status: String,
    pub amount: YooKassaAmount,
}

/// Error body returned with 4xx/5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct YooKassaErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Raw HTTP notification body.
#[derive(Debug, Clone, Deserialize)]
pub struct YooKassaNotification {
    pub event: String,
    pub object: serde_json::Value,
}

impl YooKassaNotification {
    /// Parses a raw notification body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ReconcileError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse notification body");
            ReconcileError::MalformedNotification(format!("Invalid JSON: {}", e))
        })
    }
}

impl TryFrom<YooKassaNotification> for WebhookPayload {
    type Error = ReconcileError;

    fn try_from(notification: YooKassaNotification) -> Result<Self, Self::Error> {
        let malformed =
            |e: serde_json::Error| ReconcileError::MalformedNotification(e.to_string());

        if notification.event.starts_with("refund.") {
            let refund: YooKassaRefund =
                serde_json::from_value(notification.object).map_err(malformed)?;
            return Ok(WebhookPayload {
                event_type: notification.event,
                gateway_payment_id: refund.payment_id,
                status: refund.status,
                amount: Some(refund.amount.value),
                currency: Some(refund.amount.currency),
                metadata: WebhookMetadata::default(),
            });
        }

        let payment: YooKassaPayment =
            serde_json::from_value(notification.object).map_err(malformed)?;
        Ok(WebhookPayload {
            event_type: notification.event,
            gateway_payment_id: payment.id,
            status: payment.status,
            amount: Some(payment.amount.value),
            currency: Some(payment.amount.currency),
            metadata: WebhookMetadata {
                internal_payment_id: payment.metadata.get(METADATA_PAYMENT_ID).cloned(),
                user_id: payment.metadata.get(METADATA_USER_ID).cloned(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCEEDED: &str = r#"{
        "type": "notification",
        "event": "payment.succeeded",
        "object": {
            "id": "2d9a1c3e-000f-5000-9000-1b6d3b6f1d2a",
            "status": "succeeded",
            "paid": true,
            "amount": {"value": "500.00", "currency": "RUB"},
            "metadata": {"user_id": "42", "bot_payment_id": "5f1b4f0e-8a9c-4b8e-9a57-1e0c3e3c1d11"}
        }
    }"#;

    #[test]
    fn payment_notification_becomes_payload() {
        let notification = YooKassaNotification::from_slice(SUCCEEDED.as_bytes()).unwrap();
        let payload = WebhookPayload::try_from(notification).unwrap();

        assert_eq!(payload.event_type, "payment.succeeded");
        assert_eq!(payload.gateway_payment_id, "2d9a1c3e-000f-5000-9000-1b6d3b6f1d2a");
        assert_eq!(payload.status, "succeeded");
        assert_eq!(payload.amount.as_deref(), Some("500.00"));
        assert_eq!(payload.metadata.user_id.as_deref(), Some("42"));
        assert_eq!(
            payload.metadata.internal_payment_id.as_deref(),
            Some("5f1b4f0e-8a9c-4b8e-9a57-1e0c3e3c1d11")
        );
    }

    #[test]
    fn refund_notification_points_at_payment() {
        let body = r#"{
            "event": "refund.succeeded",
            "object": {
                "id": "rf-1",
                "payment_id": "gw-7",
                "status": "succeeded",
                "amount": {"value": "500.00", "currency": "RUB"}
            }
        }"#;
        let notification = YooKassaNotification::from_slice(body.as_bytes()).unwrap();
        let payload = WebhookPayload::try_from(notification).unwrap();

        assert_eq!(payload.gateway_payment_id, "gw-7");
        assert!(payload.metadata.user_id.is_none());
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = YooKassaNotification::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedNotification(_)));
    }

    #[test]
    fn amount_converts_through_money() {
        let money = Money::new(50_000, "RUB").unwrap();
        let wire = YooKassaAmount::from_money(&money);
        assert_eq!(wire.value, "500.00");
        assert_eq!(wire.to_money().unwrap(), money);
    }
}
