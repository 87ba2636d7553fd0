//! CreatePaymentHandler - Command handler for starting a subscription payment.
//!
//! Guards against duplicate charges: an active subscriber is turned away, and
//! a recent Pending payment is handed back instead of creating another.

use std::sync::Arc;

use serde::Serialize;

use crate::application::reconciliation::ReconciliationEngine;
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Payment, PaymentStatus, ReconcileError, User};
use crate::ports::CreatePaymentRequest;

/// Command to start a payment for one subscription period.
#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    pub user_id: UserId,
}

/// Result of payment creation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CreatePaymentResult {
    /// Entitlement is already in force; nothing was created.
    AlreadySubscribed { entitlement_end: Option<Timestamp> },
    /// A recent Pending payment was handed back.
    Existing(Payment),
    Created(Payment),
}

impl CreatePaymentResult {
    /// The URL the user should open to pay, if there is one.
    pub fn confirmation_url(&self) -> Option<&str> {
        match self {
            CreatePaymentResult::Existing(p) | CreatePaymentResult::Created(p) => {
                p.confirmation_url.as_deref()
            }
            CreatePaymentResult::AlreadySubscribed { .. } => None,
        }
    }
}

/// Handler for creating payments.
///
/// The whole sequence runs under the user's lock, including the gateway
/// call, so the Pending row and the charge cannot be created twice.
pub struct CreatePaymentHandler {
    engine: Arc<ReconciliationEngine>,
}

impl CreatePaymentHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(
        &self,
        cmd: CreatePaymentCommand,
    ) -> Result<CreatePaymentResult, ReconcileError> {
        let ctx = self.engine.context();
        let _guard = self.engine.lock(cmd.user_id).await?;
        let now = Timestamp::now();

        // 1. Ensure the user row exists
        let user = match ctx
            .store
            .get_user(&cmd.user_id)
            .await
            .map_err(ReconcileError::store_read)?
        {
            Some(user) => user,
            None => {
                let user = User::register(cmd.user_id, now);
                ctx.store
                    .upsert_user(&user)
                    .await
                    .map_err(ReconcileError::store_write)?;
                user
            }
        };

        if user.is_active_now(&now) {
            tracing::debug!(user_id = %cmd.user_id, "Already subscribed, no payment created");
            return Ok(CreatePaymentResult::AlreadySubscribed {
                entitlement_end: user.entitlement_end,
            });
        }

        // 2. Hand back a recent Pending payment
        let pending = ctx
            .store
            .find_pending_payment(&cmd.user_id)
            .await
            .map_err(ReconcileError::store_read)?;
        if let Some(payment) = pending.filter(|p| p.is_eligible(&now, ctx.settings.pending_ttl)) {
            if payment.gateway_payment_id.is_some() {
                return Ok(CreatePaymentResult::Existing(payment));
            }
            // The earlier gateway call never answered. The same idempotency
            // key returns the original charge if there is one.
            tracing::info!(
                user_id = %cmd.user_id,
                payment_id = %payment.payment_id,
                "Re-issuing unanswered payment creation"
            );
            let payment = self.submit(payment).await?;
            return Ok(CreatePaymentResult::Existing(payment));
        }

        // 3. Insert a new Pending payment
        let payment = Payment::new_pending(
            cmd.user_id,
            ctx.settings.price.clone(),
            ctx.settings.description.clone(),
            now,
        );
        ctx.store
            .upsert_payment(&payment)
            .await
            .map_err(ReconcileError::store_write)?;

        // 4. Create the charge and store its id
        let payment = self.submit(payment).await?;
        tracing::info!(
            user_id = %cmd.user_id,
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            "Payment created"
        );
        Ok(CreatePaymentResult::Created(payment))
    }

    /// Sends the payment to the gateway and attaches the charge.
    ///
    /// Retryable failures leave the payment Pending; rejections mark it Failed.
    async fn submit(&self, mut payment: Payment) -> Result<Payment, ReconcileError> {
        let ctx = self.engine.context();
        let request = CreatePaymentRequest {
            payment_id: payment.payment_id,
            user_id: payment.user_id,
            amount: payment.amount.clone(),
            description: payment.description.clone(),
        };

        let created = match self
            .engine
            .gateway_call("create_payment", ctx.gateway.create_payment(request))
            .await
        {
            Ok(created) => created,
            Err(err @ ReconcileError::GatewayRejected(_)) => {
                payment.close(PaymentStatus::Failed, Timestamp::now())?;
                if let Err(e) = ctx.store.upsert_payment(&payment).await {
                    tracing::warn!(
                        payment_id = %payment.payment_id,
                        error = %e,
                        "Could not mark rejected payment failed"
                    );
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        payment.attach_gateway(
            created.gateway_payment_id,
            created.confirmation_url,
            Timestamp::now(),
        );
        ctx.store
            .upsert_payment(&payment)
            .await
            .map_err(ReconcileError::store_write)?;
        Ok(payment)
    }
}
