//! Reconciliation Engine - turns payment observations into entitlement.
//!
//! Every path that reads then writes a user's entitlement or one of their
//! payments goes through the engine, which holds the user's lock for the
//! read-modify-write. Channel removal also runs under the lock; invites,
//! notifications and alerts are sent after releasing it.
//!
//! # Module Structure
//!
//! - `observe` - The payment state machine driven by polls and webhooks
//! - `entitlement` - Registration, expiry, extension and suspension
//! - `retry` - Bounded retry for store writes

mod entitlement;
mod observe;
mod retry;

pub use entitlement::{ExpiryOutcome, Registration};
pub use observe::{ActivationReport, ObserveOutcome, PaymentRef};
pub use retry::{with_retry, RetryPolicy};

use std::future::Future;
use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{
    EntitlementChange, NotificationContext, NotificationKind, OperatorAlert, Payment,
    ReconcileError, User,
};
use crate::ports::GatewayError;

use super::access_controller::AccessController;
use super::context::ReconcileContext;
use super::user_locks::UserLockGuard;

pub struct ReconciliationEngine {
    ctx: Arc<ReconcileContext>,
    access: AccessController,
}

impl ReconciliationEngine {
    pub fn new(ctx: Arc<ReconcileContext>) -> Self {
        let access = AccessController::from_context(&ctx);
        Self { ctx, access }
    }

    pub fn context(&self) -> &ReconcileContext {
        &self.ctx
    }

    pub fn access(&self) -> &AccessController {
        &self.access
    }

    pub(crate) async fn lock(&self, user_id: UserId) -> Result<UserLockGuard, ReconcileError> {
        self.ctx
            .locks
            .acquire(user_id, self.ctx.settings.lock_timeout)
            .await
    }

    pub(crate) async fn load_user(&self, user_id: UserId) -> Result<User, ReconcileError> {
        self.ctx
            .store
            .get_user(&user_id)
            .await
            .map_err(ReconcileError::store_read)?
            .ok_or(ReconcileError::UserNotFound(user_id))
    }

    /// Persists a transition, retrying transient store failures.
    pub(crate) async fn persist(
        &self,
        user: &User,
        payment: Option<&Payment>,
        change: &EntitlementChange,
    ) -> Result<(), ReconcileError> {
        with_retry(&self.ctx.settings.store_retry, "record_transition", move || {
            self.ctx.store.record_transition(user, payment, change)
        })
        .await
        .map_err(ReconcileError::store_write)
    }

    /// Runs a gateway call under the configured deadline.
    ///
    /// Timeouts and retryable provider errors become `GatewayUnavailable`,
    /// everything else `GatewayRejected`.
    pub(crate) async fn gateway_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, ReconcileError> {
        let timeout = self.ctx.settings.gateway_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.retryable => {
                tracing::warn!(operation, error = %e, "Payment gateway unavailable");
                Err(ReconcileError::GatewayUnavailable(format!("{}: {}", operation, e)))
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    operation,
                    error = %e,
                    provider_code = ?e.provider_code,
                    "Payment gateway rejected request"
                );
                Err(ReconcileError::GatewayRejected(format!("{}: {}", operation, e)))
            }
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "Payment gateway timed out"
                );
                Err(ReconcileError::GatewayUnavailable(format!(
                    "{}: timed out after {}ms",
                    operation,
                    timeout.as_millis()
                )))
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Best-effort side effects
    // ════════════════════════════════════════════════════════════════════════════

    /// Returns whether the notifier accepted the message.
    pub(crate) async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        context: NotificationContext,
    ) -> bool {
        let result = self.ctx.notifier.notify(&user_id, kind, &context).await;
        if let Err(e) = &result {
            tracing::warn!(
                user_id = %user_id,
                kind = %kind,
                error = %e,
                "Notification not delivered"
            );
        }
        result.is_ok()
    }

    pub(crate) async fn alert(&self, alert: OperatorAlert) {
        if let Err(e) = self.ctx.notifier.alert_operators(&alert).await {
            tracing::warn!(kind = ?alert.kind, error = %e, "Operator alert not delivered");
        }
    }
}
