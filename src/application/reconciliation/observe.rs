//! The payment state machine.
//!
//! Polls and webhooks both land here. The payment is re-read under the
//! owner's lock, so whichever caller reaches the terminal-state check first
//! applies the transition and every later caller sees `AlreadyProcessed`.

use serde::Serialize;

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::subscription::{
    AlertKind, InviteToken, NotificationContext, NotificationKind, Observation, ObservedStatus,
    OperatorAlert, Payment, PaymentStatus, ReconcileError, User,
};

use super::ReconciliationEngine;

/// How an observation names its payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRef {
    /// Our own id, used by the poll path.
    Internal(PaymentId),
    /// The provider's id, used by the webhook path.
    Gateway(String),
}

impl std::fmt::Display for PaymentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentRef::Internal(id) => write!(f, "{}", id),
            PaymentRef::Gateway(id) => write!(f, "gateway:{}", id),
        }
    }
}

/// What a successful activation produced.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub user: User,
    pub payment: Payment,
    /// Invite for the channel; `None` when issuance failed.
    pub invite: Option<InviteToken>,
    /// Why the invite could not be issued. Activation stands regardless.
    pub invite_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ObserveOutcome {
    Activated(ActivationReport),
    PaymentClosed {
        payment_id: PaymentId,
        status: PaymentStatus,
    },
    /// The payment was already terminal; nothing changed.
    AlreadyProcessed {
        payment_id: PaymentId,
        status: PaymentStatus,
    },
    /// Still in flight at the provider.
    Interim {
        payment_id: PaymentId,
        status: ObservedStatus,
        capture_requested: bool,
    },
}

impl ObserveOutcome {
    pub fn is_activation(&self) -> bool {
        matches!(self, ObserveOutcome::Activated(_))
    }
}

impl ReconciliationEngine {
    /// Applies one observation of a payment's status.
    ///
    /// # Errors
    ///
    /// - `UnknownPayment` if the store has never seen the payment
    /// - `AmountMismatch` if a success reports a different amount
    /// - `StoreWriteFailure` once store retries are exhausted
    /// - `LockTimeout` if the owner's lock is busy for too long
    pub async fn observe(
        &self,
        payment: PaymentRef,
        observation: Observation,
    ) -> Result<ObserveOutcome, ReconcileError> {
        let stored = self.find_payment(&payment).await?.ok_or_else(|| {
            tracing::warn!(
                payment = %payment,
                status = %observation.status,
                "Observation for unknown payment"
            );
            ReconcileError::UnknownPayment(payment.to_string())
        })?;

        if stored.is_terminal() {
            tracing::debug!(
                payment_id = %stored.payment_id,
                status = %stored.status.as_str(),
                "Payment already terminal"
            );
            return Ok(ObserveOutcome::AlreadyProcessed {
                payment_id: stored.payment_id,
                status: stored.status,
            });
        }

        match observation.status.terminal_status() {
            Some(_) => self.settle(stored.payment_id, stored.user_id, observation).await,
            None => self.handle_interim(stored, observation).await,
        }
    }

    async fn find_payment(&self, payment: &PaymentRef) -> Result<Option<Payment>, ReconcileError> {
        let store = &self.ctx.store;
        let found = match payment {
            PaymentRef::Internal(id) => store.get_payment(id).await,
            PaymentRef::Gateway(id) => store.find_payment_by_gateway_id(id).await,
        };
        found.map_err(ReconcileError::store_read)
    }

    /// Applies a terminal observation under the owner's lock.
    async fn settle(
        &self,
        payment_id: PaymentId,
        user_id: UserId,
        observation: Observation,
    ) -> Result<ObserveOutcome, ReconcileError> {
        let guard = self.lock(user_id).await?;

        // Another caller may have settled it while we waited.
        let mut payment = self
            .find_payment(&PaymentRef::Internal(payment_id))
            .await?
            .ok_or_else(|| ReconcileError::UnknownPayment(payment_id.to_string()))?;
        if payment.is_terminal() {
            return Ok(ObserveOutcome::AlreadyProcessed {
                payment_id,
                status: payment.status,
            });
        }

        let now = Timestamp::now();
        if payment.gateway_payment_id.is_none() {
            if let Some(gateway_id) = observation.gateway_payment_id.clone() {
                payment.attach_gateway(gateway_id, None, now);
            }
        }

        if observation.status != ObservedStatus::Succeeded {
            let status = observation
                .status
                .terminal_status()
                .unwrap_or(PaymentStatus::Failed);
            payment.close(status, now)?;
            let closed = &payment;
            super::with_retry(&self.ctx.settings.store_retry, "upsert_payment", move || {
                self.ctx.store.upsert_payment(closed)
            })
            .await
            .map_err(ReconcileError::store_write)?;
            drop(guard);

            tracing::info!(
                payment_id = %payment_id,
                user_id = %user_id,
                status = %status.as_str(),
                "Payment closed"
            );
            self.notify(
                user_id,
                NotificationKind::PaymentFailed,
                NotificationContext::new()
                    .with_amount(payment.amount.clone())
                    .with_reason(observation.status.as_str()),
            )
            .await;
            return Ok(ObserveOutcome::PaymentClosed { payment_id, status });
        }

        let observed_amount = observation.amount.clone().ok_or_else(|| {
            ReconcileError::MalformedNotification(format!(
                "success for payment {} carries no amount",
                payment_id
            ))
        })?;
        if !payment.amount_matches(&observed_amount) {
            drop(guard);
            tracing::error!(
                payment_id = %payment_id,
                user_id = %user_id,
                expected = %payment.amount,
                observed = %observed_amount,
                "Amount mismatch, payment left pending for manual review"
            );
            self.alert(
                OperatorAlert::new(
                    AlertKind::AmountMismatch,
                    format!(
                        "Payment {} reported {} but {} was expected",
                        payment_id, observed_amount, payment.amount
                    ),
                )
                .for_user(user_id)
                .for_payment(payment_id),
            )
            .await;
            return Err(ReconcileError::AmountMismatch {
                payment_id,
                expected: payment.amount,
                observed: observed_amount,
            });
        }

        let mut user = match self
            .ctx
            .store
            .get_user(&user_id)
            .await
            .map_err(ReconcileError::store_read)?
        {
            Some(user) => user,
            None => User::register(user_id, now),
        };
        let change = user
            .activate_paid(self.ctx.settings.period_days, now, observation.observed_at)?
            .caused_by(payment_id);
        payment.succeed(observation.observed_at, now)?;

        if let Err(e) = self.persist(&user, Some(&payment), &change).await {
            drop(guard);
            tracing::error!(
                payment_id = %payment_id,
                user_id = %user_id,
                error = %e,
                "Could not persist successful payment"
            );
            self.alert(
                OperatorAlert::new(
                    AlertKind::StoreWriteExhausted,
                    format!("Successful payment {} could not be stored: {}", payment_id, e),
                )
                .for_user(user_id)
                .for_payment(payment_id),
            )
            .await;
            return Err(e);
        }
        drop(guard);

        tracing::info!(
            payment_id = %payment_id,
            user_id = %user_id,
            entitlement_end = ?user.entitlement_end.map(|end| *end.as_datetime()),
            total_payments = user.total_payments,
            "Entitlement activated"
        );

        let (invite, invite_error) = match self.access.grant(user_id).await {
            Ok(invite) => (Some(invite), None),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Invite not issued after activation"
                );
                (None, Some(e.to_string()))
            }
        };

        let mut context = NotificationContext::new()
            .with_entitlement_end(user.entitlement_end)
            .with_amount(payment.amount.clone());
        if let Some(invite) = &invite {
            context = context.with_invite_link(invite.token.clone());
        }
        self.notify(user_id, NotificationKind::Activated, context).await;

        Ok(ObserveOutcome::Activated(ActivationReport {
            user,
            payment,
            invite,
            invite_error,
        }))
    }

    /// Stamps the capture request on the stored payment, under the owner's
    /// lock. Returns false when a request was already recorded.
    async fn claim_capture(
        &self,
        payment_id: PaymentId,
        user_id: UserId,
    ) -> Result<bool, ReconcileError> {
        let _guard = self.lock(user_id).await?;

        let Some(mut payment) = self.find_payment(&PaymentRef::Internal(payment_id)).await? else {
            return Ok(false);
        };
        if !payment.request_capture(Timestamp::now()) {
            return Ok(false);
        }
        let claimed = &payment;
        super::with_retry(&self.ctx.settings.store_retry, "upsert_payment", move || {
            self.ctx.store.upsert_payment(claimed)
        })
        .await
        .map_err(ReconcileError::store_write)?;
        Ok(true)
    }

    /// Only an authorized charge changes anything: its capture is requested
    /// once and the provider's answer is fed back in.
    async fn handle_interim(
        &self,
        payment: Payment,
        observation: Observation,
    ) -> Result<ObserveOutcome, ReconcileError> {
        let interim = |capture_requested| ObserveOutcome::Interim {
            payment_id: payment.payment_id,
            status: observation.status,
            capture_requested,
        };

        if observation.status != ObservedStatus::WaitingForCapture {
            return Ok(interim(false));
        }
        let Some(gateway_id) = payment
            .gateway_payment_id
            .clone()
            .or_else(|| observation.gateway_payment_id.clone())
        else {
            return Ok(interim(false));
        };
        if !self.claim_capture(payment.payment_id, payment.user_id).await? {
            tracing::debug!(payment_id = %payment.payment_id, "Capture already requested");
            return Ok(interim(true));
        }

        tracing::info!(
            payment_id = %payment.payment_id,
            gateway_payment_id = %gateway_id,
            "Capturing authorized payment"
        );
        self.gateway_call("capture", self.ctx.gateway.capture(&gateway_id))
            .await?;
        let status = self
            .gateway_call("get_status", self.ctx.gateway.get_status(&gateway_id))
            .await?;

        if status.status.terminal_status().is_none() {
            return Ok(interim(true));
        }
        let recheck = Observation::new(status.status, Timestamp::now())
            .with_amount(status.amount)
            .with_gateway_id(gateway_id);
        self.settle(payment.payment_id, payment.user_id, recheck)
            .await
    }
}
