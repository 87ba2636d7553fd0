//! GetSubscriptionStatusHandler - Query handler for a user's subscription.

use std::sync::Arc;

use serde::Serialize;

use crate::application::access_controller::MembershipStatus;
use crate::application::reconciliation::ReconciliationEngine;
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{EntitlementStatus, ReconcileError};

#[derive(Debug, Clone)]
pub struct GetSubscriptionStatusQuery {
    pub user_id: UserId,
    pub now: Timestamp,
}

/// A user's subscription as they would see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusView {
    pub is_active: bool,
    pub status: EntitlementStatus,
    pub entitlement_end: Option<Timestamp>,
    pub days_left: i64,
    pub total_payments: u32,
    /// Advisory; `Unknown` when the channel could not be asked.
    pub member: MembershipStatus,
}

pub struct GetSubscriptionStatusHandler {
    engine: Arc<ReconciliationEngine>,
}

impl GetSubscriptionStatusHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionStatusQuery,
    ) -> Result<SubscriptionStatusView, ReconcileError> {
        let user = self.engine.load_user(query.user_id).await?;
        let member = self.engine.access().check_membership(query.user_id).await;

        // Only a paid entitlement counts; a trial shows up through `status`.
        let is_active = user.is_active_now(&query.now);

        Ok(SubscriptionStatusView {
            is_active,
            status: user.entitlement_status,
            entitlement_end: user.entitlement_end,
            days_left: if is_active {
                user.days_left(&query.now)
            } else {
                0
            },
            total_payments: user.total_payments,
            member,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciliation::test_support::Harness;
    use crate::ports::{AccessError, EntitlementStore};

    #[tokio::test]
    async fn reports_active_subscription() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(3).await;
        user.extend(10, "seed", now).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        h.channel.add_member(UserId::new(3));
        let handler = GetSubscriptionStatusHandler::new(h.engine.clone());

        let view = handler
            .handle(GetSubscriptionStatusQuery {
                user_id: UserId::new(3),
                now,
            })
            .await
            .unwrap();

        assert!(view.is_active);
        assert_eq!(view.status, EntitlementStatus::Active);
        assert_eq!(view.days_left, 10);
        assert_eq!(view.member, MembershipStatus::Member);
    }

    #[tokio::test]
    async fn expired_user_has_no_days_left() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.user(3).await;
        let handler = GetSubscriptionStatusHandler::new(h.engine.clone());

        let view = handler
            .handle(GetSubscriptionStatusQuery {
                user_id: UserId::new(3),
                now,
            })
            .await
            .unwrap();

        assert!(!view.is_active);
        assert_eq!(view.days_left, 0);
        assert_eq!(view.member, MembershipStatus::NotMember);
    }

    #[tokio::test]
    async fn trial_is_not_reported_active() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(3).await;
        user.start_trial(3, now).unwrap();
        h.store.upsert_user(&user).await.unwrap();
        let handler = GetSubscriptionStatusHandler::new(h.engine.clone());

        let view = handler
            .handle(GetSubscriptionStatusQuery {
                user_id: UserId::new(3),
                now,
            })
            .await
            .unwrap();

        assert!(!view.is_active);
        assert_eq!(view.status, EntitlementStatus::Trial);
        assert_eq!(view.entitlement_end, Some(now.plus_days(3)));
        assert_eq!(view.days_left, 0);
    }

    #[tokio::test]
    async fn membership_failure_reports_unknown() {
        let h = Harness::new();
        h.user(3).await;
        h.channel.set_method_error(
            "get_member_status",
            AccessError::Request("reset".into()),
        );
        let handler = GetSubscriptionStatusHandler::new(h.engine.clone());

        let view = handler
            .handle(GetSubscriptionStatusQuery {
                user_id: UserId::new(3),
                now: Timestamp::now(),
            })
            .await
            .unwrap();

        assert_eq!(view.member, MembershipStatus::Unknown);
    }
}
