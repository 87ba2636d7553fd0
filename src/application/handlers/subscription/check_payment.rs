//! CheckPaymentHandler - Command handler for the user's "I paid" poll.

use std::sync::Arc;

use crate::application::reconciliation::{ObserveOutcome, PaymentRef, ReconciliationEngine};
use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::subscription::{Observation, ObservedStatus, ReconcileError};

/// Command to poll the gateway for one of the user's payments.
#[derive(Debug, Clone)]
pub struct CheckPaymentCommand {
    pub user_id: UserId,
    pub payment_id: PaymentId,
}

/// Handler for user-initiated payment checks.
///
/// The gateway is asked outside any lock; its answer goes through the same
/// `observe` path as webhooks.
pub struct CheckPaymentHandler {
    engine: Arc<ReconciliationEngine>,
}

impl CheckPaymentHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, cmd: CheckPaymentCommand) -> Result<ObserveOutcome, ReconcileError> {
        let ctx = self.engine.context();

        let payment = ctx
            .store
            .get_payment(&cmd.payment_id)
            .await
            .map_err(ReconcileError::store_read)?
            .ok_or_else(|| ReconcileError::UnknownPayment(cmd.payment_id.to_string()))?;

        if payment.user_id != cmd.user_id {
            tracing::warn!(
                payment_id = %cmd.payment_id,
                claimed = %cmd.user_id,
                "Payment checked by someone else"
            );
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

        let Some(gateway_id) = payment.gateway_payment_id else {
            // Creation never reached the gateway; nothing to ask about.
            return Ok(ObserveOutcome::Interim {
                payment_id: payment.payment_id,
                status: ObservedStatus::Pending,
                capture_requested: false,
            });
        };

        let status = self
            .engine
            .gateway_call("get_status", ctx.gateway.get_status(&gateway_id))
            .await?;

        if let Some(owner) = status.metadata.user_id {
            if owner != cmd.user_id {
                return Err(ReconcileError::OwnershipMismatch {
                    payment_id: cmd.payment_id,
                    claimed: cmd.user_id,
                });
            }
        }

        let observation = Observation::new(status.status, Timestamp::now())
            .with_amount(status.amount)
            .with_gateway_id(gateway_id);
        self.engine
            .observe(PaymentRef::Internal(cmd.payment_id), observation)
            .await
    }
}
