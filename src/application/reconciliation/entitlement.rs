//! Entitlement changes that are not driven by a payment.

use serde::Serialize;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    AlertKind, EntitlementStatus, NotificationContext, NotificationKind, OperatorAlert,
    ReconcileError, User,
};

use super::ReconciliationEngine;

/// Result of `register_user`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: User,
    /// False when the user already existed and was returned unchanged.
    pub created: bool,
}

/// Result of re-checking one user during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryOutcome {
    Expired {
        user: User,
        /// Set when the member could not be removed from the channel.
        revoke_error: Option<String>,
    },
    /// Renewed, extended or suspended since the sweep listed them.
    Skipped,
}

impl ReconciliationEngine {
    /// Idempotent registration. New users get the configured trial, if any.
    pub async fn register_user(
        &self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<Registration, ReconcileError> {
        let guard = self.lock(user_id).await?;

        if let Some(existing) = self
            .ctx
            .store
            .get_user(&user_id)
            .await
            .map_err(ReconcileError::store_read)?
        {
            return Ok(Registration {
                user: existing,
                created: false,
            });
        }

        let mut user = User::register(user_id, now);
        let trial_days = self.ctx.settings.trial_days;
        if trial_days > 0 {
            let change = user.start_trial(trial_days, now)?;
            self.persist(&user, None, &change).await?;
        } else {
            self.ctx
                .store
                .upsert_user(&user)
                .await
                .map_err(ReconcileError::store_write)?;
        }
        drop(guard);

        tracing::info!(user_id = %user_id, trial_days, "User registered");
        let mut context = NotificationContext::new().with_entitlement_end(user.entitlement_end);
        if trial_days > 0 {
            context = context.with_days_left(trial_days);
        }
        self.notify(user_id, NotificationKind::Welcome, context).await;

        Ok(Registration {
            user,
            created: true,
        })
    }

    /// Demotes the user if their paid entitlement has lapsed, then removes
    /// them from the channel.
    ///
    /// The check is repeated under the lock, so a renewal that lands between
    /// listing and processing wins. Revocation also runs under the lock: a
    /// payment observed meanwhile waits, and its invite is issued after the
    /// removal instead of being revoked by it.
    pub async fn expire_if_due(
        &self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<ExpiryOutcome, ReconcileError> {
        let _guard = self.lock(user_id).await?;

        let mut user = self.load_user(user_id).await?;
        if !user.is_lapsed_at(&now) {
            tracing::debug!(
                user_id = %user_id,
                status = %user.entitlement_status.as_str(),
                "No longer due for expiry"
            );
            return Ok(ExpiryOutcome::Skipped);
        }

        let change = user.expire(now)?;
        self.persist(&user, None, &change).await?;
        tracing::info!(user_id = %user_id, "Entitlement expired");

        let revoke_error = match self.access.revoke(user_id).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Access not revoked after expiry");
                Some(e.to_string())
            }
        };
        Ok(ExpiryOutcome::Expired { user, revoke_error })
    }

    /// Operator-granted days on top of whatever is left.
    ///
    /// A user who was not active gets a fresh invite with the notification.
    pub async fn extend_entitlement(
        &self,
        user_id: UserId,
        days: i64,
        reason: &str,
    ) -> Result<User, ReconcileError> {
        let guard = self.lock(user_id).await?;
        let now = Timestamp::now();

        let mut user = self.load_user(user_id).await?;
        let was_active = user.is_active_now(&now);
        let change = user.extend(days, reason, now)?;
        self.persist(&user, None, &change).await?;
        drop(guard);

        tracing::info!(user_id = %user_id, days, reason, "Entitlement extended");

        let mut context = NotificationContext::new()
            .with_entitlement_end(user.entitlement_end)
            .with_days_left(days)
            .with_reason(reason);
        if !was_active {
            match self.access.grant(user_id).await {
                Ok(invite) => context = context.with_invite_link(invite.token),
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %e,
                        "Invite not issued after extension"
                    );
                }
            }
        }
        self.notify(user_id, NotificationKind::Extended, context).await;

        Ok(user)
    }

    /// Administrative or refund-driven revocation.
    ///
    /// Remaining time is forfeited. The suspension stands even when the
    /// channel provider cannot remove the member; operators are alerted
    /// instead.
    pub async fn suspend_entitlement(
        &self,
        user_id: UserId,
        reason: &str,
    ) -> Result<User, ReconcileError> {
        let guard = self.lock(user_id).await?;
        let now = Timestamp::now();

        let mut user = self.load_user(user_id).await?;
        let change = user.suspend(reason, now)?;
        self.persist(&user, None, &change).await?;
        tracing::info!(user_id = %user_id, reason, "Entitlement suspended");

        // Under the lock, so a concurrent reactivation cannot be revoked.
        let revoked = self.access.revoke(user_id).await;
        drop(guard);

        if let Err(e) = revoked {
            tracing::warn!(user_id = %user_id, error = %e, "Access not revoked after suspension");
            self.alert(
                OperatorAlert::new(
                    AlertKind::AccessRevocationFailed,
                    format!("Suspended user {} could not be removed: {}", user_id, e),
                )
                .for_user(user_id),
            )
            .await;
        }
        self.notify(
            user_id,
            NotificationKind::Cancelled,
            NotificationContext::new().with_reason(reason),
        )
        .await;

        Ok(user)
    }

    /// True when the user is in a state a refund should suspend.
    pub(crate) async fn is_suspendable(&self, user_id: UserId) -> Result<bool, ReconcileError> {
        let user = self.load_user(user_id).await?;
        Ok(user.entitlement_status != EntitlementStatus::Suspended)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::super::{ObserveOutcome, PaymentRef};
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::subscription::{EntitlementAction, Observation};
    use crate::ports::{AccessError, EntitlementStore};

    #[tokio::test]
    async fn registration_is_idempotent() {
        let h = Harness::new();
        let now = Timestamp::now();

        let first = h.engine.register_user(UserId::new(5), now).await.unwrap();
        let second = h.engine.register_user(UserId::new(5), now).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.user, second.user);
        assert_eq!(first.user.entitlement_status, EntitlementStatus::Expired);
        assert_eq!(h.notifier.count(NotificationKind::Welcome), 1);
    }

    #[tokio::test]
    async fn registration_starts_configured_trial() {
        let h = Harness::with_settings(|s| s.trial_days = 3);
        let now = Timestamp::now();

        let registration = h.engine.register_user(UserId::new(5), now).await.unwrap();

        assert_eq!(registration.user.entitlement_status, EntitlementStatus::Trial);
        assert_eq!(registration.user.entitlement_end, Some(now.plus_days(3)));
        let history = h.store.history_for(&UserId::new(5)).await.unwrap();
        assert_eq!(history[0].action, EntitlementAction::TrialStarted);
    }

    #[tokio::test]
    async fn lapsed_user_is_expired() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(5).await;
        user.extend(30, "seed", now.minus_days(31)).unwrap();
        h.store.upsert_user(&user).await.unwrap();

        let outcome = h.engine.expire_if_due(UserId::new(5), now).await.unwrap();

        let ExpiryOutcome::Expired {
            user: expired,
            revoke_error,
        } = outcome
        else {
            panic!("expected expiry");
        };
        assert_eq!(expired.entitlement_status, EntitlementStatus::Expired);
        assert_eq!(expired.entitlement_end, user.entitlement_end);
        assert_eq!(revoke_error, None);
    }

    #[tokio::test]
    async fn expiry_removes_member_before_releasing_the_user() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(5).await;
        user.extend(30, "seed", now.minus_days(31)).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        h.channel.add_member(UserId::new(5));

        h.engine.expire_if_due(UserId::new(5), now).await.unwrap();

        assert!(!h.channel.is_member(&UserId::new(5)));
        assert!(h.channel.was_called("unban"));
    }

    #[tokio::test]
    async fn expiry_reports_failed_revocation() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(5).await;
        user.extend(30, "seed", now.minus_days(31)).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        h.channel
            .set_method_error("ban", AccessError::Refused("no rights".into()));

        let outcome = h.engine.expire_if_due(UserId::new(5), now).await.unwrap();

        assert!(matches!(
            outcome,
            ExpiryOutcome::Expired { revoke_error: Some(_), .. }
        ));
        let stored = h.store.get_user(&UserId::new(5)).await.unwrap().unwrap();
        assert_eq!(stored.entitlement_status, EntitlementStatus::Expired);
    }

    #[tokio::test]
    async fn renewed_user_is_skipped() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(5).await;
        user.extend(30, "seed", now).unwrap();
        h.store.upsert_user(&user).await.unwrap();

        let outcome = h.engine.expire_if_due(UserId::new(5), now).await.unwrap();

        assert_eq!(outcome, ExpiryOutcome::Skipped);
    }

    #[tokio::test]
    async fn extension_adds_to_remaining_time() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(5).await;
        user.extend(5, "seed", now).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        let end = user.entitlement_end.unwrap();

        let extended = h
            .engine
            .extend_entitlement(UserId::new(5), 10, "support")
            .await
            .unwrap();

        assert_eq!(extended.entitlement_end, Some(end.plus_days(10)));
        assert_eq!(h.notifier.count(NotificationKind::Extended), 1);
        // Already active, so no new invite.
        assert!(!h.channel.was_called("create_invite"));
    }

    #[tokio::test]
    async fn extending_inactive_user_sends_invite() {
        let h = Harness::new();
        h.user(5).await;

        h.engine
            .extend_entitlement(UserId::new(5), 7, "goodwill")
            .await
            .unwrap();

        let sent = h.notifier.notifications_for(&UserId::new(5));
        assert!(sent[0].context.invite_link.is_some());
    }

    #[tokio::test]
    async fn extending_unknown_user_fails() {
        let h = Harness::new();

        let result = h.engine.extend_entitlement(UserId::new(99), 7, "x").await;

        assert!(matches!(result, Err(ReconcileError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn suspension_revokes_and_notifies() {
        let h = Harness::new();
        let mut user = h.user(5).await;
        user.extend(30, "seed", Timestamp::now()).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        h.channel.add_member(UserId::new(5));

        let suspended = h
            .engine
            .suspend_entitlement(UserId::new(5), "refund")
            .await
            .unwrap();

        assert_eq!(suspended.entitlement_status, EntitlementStatus::Suspended);
        assert!(!h.channel.is_member(&UserId::new(5)));
        assert_eq!(h.notifier.count(NotificationKind::Cancelled), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn payment_during_suspension_keeps_its_invite() {
        let h = Harness::new();
        let mut user = h.user(5).await;
        user.extend(30, "seed", Timestamp::now()).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        let payment = h.pending_payment(5).await;
        h.channel.set_latency(std::time::Duration::from_millis(100));

        let activation = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            h.engine
                .observe(
                    PaymentRef::Internal(payment.payment_id),
                    Observation::succeeded(payment.amount.clone(), Timestamp::now()),
                )
                .await
        };
        let (suspended, outcome) = tokio::join!(
            h.engine.suspend_entitlement(UserId::new(5), "abuse"),
            activation
        );

        assert_eq!(
            suspended.unwrap().entitlement_status,
            EntitlementStatus::Suspended
        );
        let ObserveOutcome::Activated(activated) = outcome.unwrap() else {
            panic!("expected activation");
        };
        let invite = activated.invite.expect("invite issued");
        assert!(!h.channel.is_revoked(&invite.token));
        assert!(h.channel.redeem(UserId::new(5), &invite.token));
    }

    #[tokio::test]
    async fn suspension_stands_when_revocation_fails() {
        let h = Harness::new();
        h.user(5).await;
        h.channel
            .set_method_error("ban", AccessError::Refused("no rights".into()));

        let suspended = h
            .engine
            .suspend_entitlement(UserId::new(5), "abuse")
            .await
            .unwrap();

        assert_eq!(suspended.entitlement_status, EntitlementStatus::Suspended);
        assert_eq!(h.notifier.alerts()[0].kind, AlertKind::AccessRevocationFailed);
    }

    #[tokio::test]
    async fn suspending_twice_is_rejected() {
        let h = Harness::new();
        h.user(5).await;
        h.engine
            .suspend_entitlement(UserId::new(5), "abuse")
            .await
            .unwrap();

        let again = h.engine.suspend_entitlement(UserId::new(5), "abuse").await;

        assert_eq!(
            again.unwrap_err().code(),
            ErrorCode::InvalidStateTransition
        );
        assert!(!h.engine.is_suspendable(UserId::new(5)).await.unwrap());
    }
}
