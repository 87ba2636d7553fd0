//! ProcessNotificationHandler - Command handler for payment provider webhooks.
//!
//! The transport verifies the signature and parses the body; this handler
//! validates the metadata and routes the status through `observe`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::reconciliation::{ObserveOutcome, PaymentRef, ReconciliationEngine};
use crate::domain::foundation::{Money, PaymentId, Timestamp, UserId};
use crate::domain::subscription::{Observation, ObservedStatus, Payment, ReconcileError};

const REFUND_SUCCEEDED: &str = "refund.succeeded";

/// A parsed provider notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// e.g. "payment.succeeded", "refund.succeeded".
    pub event_type: String,
    pub gateway_payment_id: String,
    pub status: String,
    /// Decimal string such as "500.00".
    pub amount: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

/// Metadata we attached when creating the charge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMetadata {
    pub internal_payment_id: Option<String>,
    pub user_id: Option<String>,
}

/// Result of webhook processing.
#[derive(Debug, Clone)]
pub enum ProcessNotificationResult {
    Observed(ObserveOutcome),
    /// A refund suspended the payment owner's entitlement.
    Suspended { user_id: UserId },
    /// Event acknowledged but no action taken.
    Ignored { reason: String },
}

/// Handler for provider notifications.
pub struct ProcessNotificationHandler {
    engine: Arc<ReconciliationEngine>,
}

impl ProcessNotificationHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(
        &self,
        payload: WebhookPayload,
    ) -> Result<ProcessNotificationResult, ReconcileError> {
        tracing::debug!(
            event_type = %payload.event_type,
            gateway_payment_id = %payload.gateway_payment_id,
            status = %payload.status,
            "Notification received"
        );

        if payload.event_type.starts_with("refund.") {
            return self.handle_refund(&payload).await;
        }

        // 1. Validate metadata
        let internal_id = payload
            .metadata
            .internal_payment_id
            .as_deref()
            .ok_or(ReconcileError::MissingMetadata("internal_payment_id"))?;
        let claimed_user = payload
            .metadata
            .user_id
            .as_deref()
            .ok_or(ReconcileError::MissingMetadata("user_id"))?;
        let payment_id = parse_payment_id(internal_id)?;
        let claimed_user = parse_user_id(claimed_user)?;

        // 2. Map the status; unknown ones are acknowledged and dropped
        let Some(status) = ObservedStatus::from_gateway(&payload.status) else {
            tracing::info!(status = %payload.status, "Ignoring notification with unknown status");
            return Ok(ProcessNotificationResult::Ignored {
                reason: format!("unknown status {}", payload.status),
            });
        };

        // 3. Resolve and authenticate the payment
        let payment = self
            .resolve(&payload.gateway_payment_id, payment_id)
            .await?;
        if payment.user_id != claimed_user {
            tracing::warn!(
                payment_id = %payment.payment_id,
                owner = %payment.user_id,
                claimed = %claimed_user,
                "Notification metadata names another user"
            );
            return Err(ReconcileError::OwnershipMismatch {
                payment_id: payment.payment_id,
                claimed: claimed_user,
            });
        }

        // 4. Observe
        let mut observation = Observation::new(status, Timestamp::now())
            .with_gateway_id(payload.gateway_payment_id.clone());
        if let Some(amount) = parse_amount(&payload)? {
            observation = observation.with_amount(amount);
        }
        let outcome = self
            .engine
            .observe(PaymentRef::Internal(payment.payment_id), observation)
            .await?;
        Ok(ProcessNotificationResult::Observed(outcome))
    }

    /// Finds the payment by gateway id, falling back to our own id for a
    /// charge whose creation response was lost.
    async fn resolve(
        &self,
        gateway_payment_id: &str,
        payment_id: PaymentId,
    ) -> Result<Payment, ReconcileError> {
        let store = &self.engine.context().store;

        if let Some(payment) = store
            .find_payment_by_gateway_id(gateway_payment_id)
            .await
            .map_err(ReconcileError::store_read)?
        {
            if payment.payment_id != payment_id {
                tracing::warn!(
                    gateway_payment_id,
                    payment_id = %payment_id,
                    "Notification metadata names another payment"
                );
                return Err(ReconcileError::UnknownPayment(gateway_payment_id.to_string()));
            }
            return Ok(payment);
        }

        match store
            .get_payment(&payment_id)
            .await
            .map_err(ReconcileError::store_read)?
        {
            Some(payment)
                if payment
                    .gateway_payment_id
                    .as_deref()
                    .map_or(true, |id| id == gateway_payment_id) =>
            {
                Ok(payment)
            }
            _ => {
                tracing::warn!(gateway_payment_id, "Notification for unknown payment");
                Err(ReconcileError::UnknownPayment(gateway_payment_id.to_string()))
            }
        }
    }

    async fn handle_refund(
        &self,
        payload: &WebhookPayload,
    ) -> Result<ProcessNotificationResult, ReconcileError> {
        if payload.event_type != REFUND_SUCCEEDED {
            return Ok(ProcessNotificationResult::Ignored {
                reason: format!("{} is not acted on", payload.event_type),
            });
        }

        let payment = self
            .engine
            .context()
            .store
            .find_payment_by_gateway_id(&payload.gateway_payment_id)
            .await
            .map_err(ReconcileError::store_read)?
            .ok_or_else(|| ReconcileError::UnknownPayment(payload.gateway_payment_id.clone()))?;

        if !self.engine.is_suspendable(payment.user_id).await? {
            return Ok(ProcessNotificationResult::Ignored {
                reason: "already suspended".to_string(),
            });
        }

        tracing::info!(
            user_id = %payment.user_id,
            payment_id = %payment.payment_id,
            "Refund received, suspending"
        );
        self.engine
            .suspend_entitlement(payment.user_id, "refund")
            .await?;
        Ok(ProcessNotificationResult::Suspended {
            user_id: payment.user_id,
        })
    }
}

fn parse_payment_id(value: &str) -> Result<PaymentId, ReconcileError> {
    value
        .parse::<PaymentId>()
        .map_err(|_| ReconcileError::MalformedNotification(format!("invalid payment id {}", value)))
}

fn parse_user_id(value: &str) -> Result<UserId, ReconcileError> {
    value
        .parse::<i64>()
        .map(UserId::new)
        .map_err(|_| ReconcileError::MalformedNotification(format!("invalid user id {}", value)))
}

fn parse_amount(payload: &WebhookPayload) -> Result<Option<Money>, ReconcileError> {
    match (&payload.amount, &payload.currency) {
        (Some(value), Some(currency)) => Money::parse_decimal(value, currency)
            .map(Some)
            .map_err(|e| ReconcileError::MalformedNotification(e.to_string())),
        _ => Ok(None),
    }
}
