//! CancelPaymentHandler - Command handler for abandoning a pending payment.

use std::sync::Arc;

use crate::application::reconciliation::{ObserveOutcome, PaymentRef, ReconciliationEngine};
use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::subscription::{Observation, ObservedStatus, ReconcileError};

/// Command to cancel one of the user's pending payments.
#[derive(Debug, Clone)]
pub struct CancelPaymentCommand {
    pub user_id: UserId,
    pub payment_id: PaymentId,
}

pub struct CancelPaymentHandler {
    engine: Arc<ReconciliationEngine>,
}

impl CancelPaymentHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(
        &self,
        cmd: CancelPaymentCommand,
    ) -> Result<ObserveOutcome, ReconcileError> {
        let ctx = self.engine.context();

        let payment = ctx
            .store
            .get_payment(&cmd.payment_id)
            .await
            .map_err(ReconcileError::store_read)?
            .ok_or_else(|| ReconcileError::UnknownPayment(cmd.payment_id.to_string()))?;

        if payment.user_id != cmd.user_id {
            return Err(ReconcileError::OwnershipMismatch {
                payment_id: cmd.payment_id,
                claimed: cmd.user_id,
            });
        }
        if payment.is_terminal() {
            return Ok(ObserveOutcome::AlreadyProcessed {
                payment_id: payment.payment_id,
                status: payment.status,
            });
        }

        if let Some(gateway_id) = &payment.gateway_payment_id {
            self.engine
                .gateway_call("cancel", ctx.gateway.cancel(gateway_id))
                .await?;
        }

        tracing::info!(
            user_id = %cmd.user_id,
            payment_id = %cmd.payment_id,
            "Payment cancelled by user"
        );
        self.engine
            .observe(
                PaymentRef::Internal(cmd.payment_id),
                Observation::new(ObservedStatus::Canceled, Timestamp::now()),
            )
            .await
    }
}
