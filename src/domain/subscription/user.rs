//! User aggregate - a subscriber and their entitlement.
//!
//! # Invariants
//!
//! - `entitlement_status == Active` implies `entitlement_end` is set
//! - `total_payments` only grows, by one per newly observed successful payment
//! - Status changes follow the `EntitlementStatus` state machine
//!
//! Every mutating method returns the `EntitlementChange` to append to
//! history, so callers persist the row and its audit entry together.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, StateMachine, Timestamp, UserId};

use super::{EntitlementAction, EntitlementChange, EntitlementStatus};

/// A subscriber known to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub entitlement_status: EntitlementStatus,
    /// Entitlement is valid strictly while `now < entitlement_end`.
    pub entitlement_end: Option<Timestamp>,
    pub total_payments: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Computes the end of an entitlement after adding `period_days`.
///
/// Time still left on a future `current_end` is kept: the period is added
/// on top of it. Otherwise the period starts at `base`.
pub fn renewed_end(
    current_end: Option<Timestamp>,
    now: Timestamp,
    base: Timestamp,
    period_days: i64,
) -> Timestamp {
    match current_end {
        Some(end) if end.is_after(&now) => end.plus_days(period_days),
        _ => base.plus_days(period_days),
    }
}

impl User {
    /// A freshly seen user with no entitlement.
    pub fn register(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            entitlement_status: EntitlementStatus::Expired,
            entitlement_end: None,
            total_payments: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// True while a paid entitlement is in force.
    pub fn is_active_now(&self, now: &Timestamp) -> bool {
        self.entitlement_status == EntitlementStatus::Active
            && self.entitlement_end.is_some_and(|end| end.is_after(now))
    }

    /// True when the sweeper should demote this user.
    pub fn is_lapsed_at(&self, now: &Timestamp) -> bool {
        self.entitlement_status == EntitlementStatus::Active
            && self.entitlement_end.is_some_and(|end| end.is_before(now))
    }

    /// Whole days left on the entitlement, zero when none.
    pub fn days_left(&self, now: &Timestamp) -> i64 {
        self.entitlement_end
            .map(|end| end.whole_days_after(now))
            .unwrap_or(0)
    }

    /// Grants the registration trial.
    pub fn start_trial(
        &mut self,
        days: i64,
        now: Timestamp,
    ) -> Result<EntitlementChange, DomainError> {
        if days <= 0 {
            return Err(DomainError::validation("trial_days", "Trial must be at least one day"));
        }
        let previous_end = self.entitlement_end;
        self.transition_to(EntitlementStatus::Trial, now)?;
        self.entitlement_end = Some(now.plus_days(days));

        Ok(EntitlementChange::new(
            self.user_id,
            EntitlementAction::TrialStarted,
            previous_end,
            self.entitlement_end,
            "registration",
            now,
        ))
    }

    /// Applies a newly observed successful payment.
    pub fn activate_paid(
        &mut self,
        period_days: i64,
        now: Timestamp,
        observed_at: Timestamp,
    ) -> Result<EntitlementChange, DomainError> {
        let previous_end = self.entitlement_end;

        self.transition_to(EntitlementStatus::Active, now)?;
        self.entitlement_end = Some(renewed_end(previous_end, now, observed_at, period_days));
        self.total_payments = self.total_payments.saturating_add(1);

        Ok(EntitlementChange::new(
            self.user_id,
            EntitlementAction::Activated,
            previous_end,
            self.entitlement_end,
            "payment",
            now,
        ))
    }

    /// Operator-granted extension. Does not count as a payment.
    pub fn extend(
        &mut self,
        days: i64,
        reason: &str,
        now: Timestamp,
    ) -> Result<EntitlementChange, DomainError> {
        if days <= 0 {
            return Err(DomainError::validation("days", "Extension must be at least one day"));
        }
        let previous_end = self.entitlement_end;

        self.transition_to(EntitlementStatus::Active, now)?;
        self.entitlement_end = Some(renewed_end(previous_end, now, now, days));

        Ok(EntitlementChange::new(
            self.user_id,
            EntitlementAction::Extended,
            previous_end,
            self.entitlement_end,
            reason,
            now,
        ))
    }

    /// Demotes a lapsed entitlement. `entitlement_end` is kept for history.
    pub fn expire(&mut self, now: Timestamp) -> Result<EntitlementChange, DomainError> {
        self.transition_to(EntitlementStatus::Expired, now)?;
        Ok(EntitlementChange::new(
            self.user_id,
            EntitlementAction::Expired,
            self.entitlement_end,
            self.entitlement_end,
            "entitlement ended",
            now,
        ))
    }

    /// Administrative or refund-driven revocation.
    ///
    /// Time still left is forfeited: the end is cut to `now`, so a later
    /// payment starts a fresh period.
    pub fn suspend(
        &mut self,
        reason: &str,
        now: Timestamp,
    ) -> Result<EntitlementChange, DomainError> {
        let previous_end = self.entitlement_end;
        self.transition_to(EntitlementStatus::Suspended, now)?;
        if previous_end.is_some_and(|end| end.is_after(&now)) {
            self.entitlement_end = Some(now);
        }
        Ok(EntitlementChange::new(
            self.user_id,
            EntitlementAction::Suspended,
            previous_end,
            self.entitlement_end,
            reason,
            now,
        ))
    }

    fn transition_to(
        &mut self,
        target: EntitlementStatus,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.entitlement_status = self.entitlement_status.transition_to(target)?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use proptest::prelude::*;

    fn now() -> Timestamp {
        Timestamp::now()
    }

    fn active_until(end: Timestamp) -> User {
        let mut user = User::register(UserId::new(1), end.minus_days(60));
        user.entitlement_status = EntitlementStatus::Active;
        user.entitlement_end = Some(end);
        user.total_payments = 1;
        user
    }

    #[test]
    fn registered_user_starts_expired_without_end() {
        let user = User::register(UserId::new(5), now());
        assert_eq!(user.entitlement_status, EntitlementStatus::Expired);
        assert_eq!(user.entitlement_end, None);
        assert_eq!(user.total_payments, 0);
        assert!(!user.is_active_now(&now()));
    }

    #[test]
    fn first_payment_starts_from_observation_time() {
        let now = now();
        let observed_at = now.minus_days(1);
        let mut user = User::register(UserId::new(1), now);

        let change = user.activate_paid(30, now, observed_at).unwrap();

        assert_eq!(user.entitlement_end, Some(observed_at.plus_days(30)));
        assert_eq!(user.entitlement_status, EntitlementStatus::Active);
        assert_eq!(user.total_payments, 1);
        assert_eq!(change.action, EntitlementAction::Activated);
        assert_eq!(change.previous_end, None);
    }

    #[test]
    fn early_payment_extends_from_current_end() {
        let now = now();
        let mut user = active_until(now.plus_days(5));

        user.activate_paid(30, now, now).unwrap();

        assert_eq!(user.entitlement_end, Some(now.plus_days(35)));
        assert_eq!(user.total_payments, 2);
    }

    #[test]
    fn lapsed_end_is_not_carried() {
        let now = now();
        let mut user = active_until(now.minus_days(3));

        user.activate_paid(30, now, now).unwrap();

        assert_eq!(user.entitlement_end, Some(now.plus_days(30)));
    }

    #[test]
    fn trial_time_is_carried_into_paid_period() {
        let now = now();
        let mut user = User::register(UserId::new(1), now);
        user.start_trial(3, now).unwrap();

        user.activate_paid(30, now, now).unwrap();

        assert_eq!(user.entitlement_end, Some(now.plus_days(33)));
    }

    #[test]
    fn suspension_forfeits_remaining_time() {
        let now = now();
        let mut user = active_until(now.plus_days(10));

        let change = user.suspend("refund", now).unwrap();

        assert_eq!(user.entitlement_end, Some(now));
        assert_eq!(change.previous_end, Some(now.plus_days(10)));
        assert_eq!(change.new_end, Some(now));

        let later = now.plus(chrono::Duration::minutes(5));
        user.activate_paid(30, later, later).unwrap();
        assert_eq!(user.entitlement_end, Some(later.plus_days(30)));
    }

    #[test]
    fn suspension_keeps_an_end_already_in_the_past() {
        let now = now();
        let end = now.minus_days(2);
        let mut user = active_until(end);

        user.suspend("abuse", now).unwrap();

        assert_eq!(user.entitlement_end, Some(end));
    }

    #[test]
    fn renewal_rule_is_the_same_in_every_status() {
        let now = now();
        let mut user = active_until(now.plus_days(4));
        user.entitlement_status = EntitlementStatus::Suspended;

        user.activate_paid(30, now, now).unwrap();

        assert_eq!(user.entitlement_end, Some(now.plus_days(34)));
    }

    #[test]
    fn trial_requires_positive_days() {
        let mut user = User::register(UserId::new(1), now());
        let err = user.start_trial(0, now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(user.entitlement_status, EntitlementStatus::Expired);
    }

    #[test]
    fn extension_does_not_count_as_payment() {
        let now = now();
        let mut user = active_until(now.plus_days(2));

        let change = user.extend(7, "goodwill", now).unwrap();

        assert_eq!(user.entitlement_end, Some(now.plus_days(9)));
        assert_eq!(user.total_payments, 1);
        assert_eq!(change.reason, "goodwill");
    }

    #[test]
    fn expire_keeps_end_for_history() {
        let now = now();
        let end = now.minus_days(1);
        let mut user = active_until(end);

        user.expire(now).unwrap();

        assert_eq!(user.entitlement_status, EntitlementStatus::Expired);
        assert_eq!(user.entitlement_end, Some(end));
    }

    #[test]
    fn expired_user_cannot_expire_again() {
        let mut user = User::register(UserId::new(1), now());
        let err = user.expire(now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn lapse_detection_is_strict() {
        let now = now();
        assert!(active_until(now.minus(chrono::Duration::seconds(1))).is_lapsed_at(&now));
        assert!(!active_until(now.plus(chrono::Duration::seconds(1))).is_lapsed_at(&now));
    }

    #[test]
    fn days_left_reports_whole_days() {
        let now = now();
        let user = active_until(now.plus_days(4).plus(chrono::Duration::hours(3)));
        assert_eq!(user.days_left(&now), 4);
        assert_eq!(User::register(UserId::new(2), now).days_left(&now), 0);
    }

    proptest! {
        #[test]
        fn renewal_adds_period_to_remaining_time(remaining in 1i64..400, period in 1i64..400) {
            let now = Timestamp::now();
            let end = renewed_end(Some(now.plus_days(remaining)), now, now, period);
            prop_assert_eq!(end, now.plus_days(remaining + period));
        }

        #[test]
        fn renewal_after_lapse_starts_at_base(overdue in 0i64..400, period in 1i64..400) {
            let now = Timestamp::now();
            let base = now.minus_days(1);
            let end = renewed_end(Some(now.minus_days(overdue)), now, base, period);
            prop_assert_eq!(end, base.plus_days(period));
        }
    }
}
