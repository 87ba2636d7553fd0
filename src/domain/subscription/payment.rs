//! Payment entity.
//!
//! A payment is created Pending with an internal id that doubles as the
//! gateway idempotency key. The gateway id and confirmation URL arrive
//! later, once the provider has accepted the charge.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, Money, PaymentId, StateMachine, Timestamp, UserId};

use super::PaymentStatus;

/// One attempt by a user to pay for a subscription period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    /// Set once the gateway confirms creation. Unique when present.
    pub gateway_payment_id: Option<String>,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub description: String,
    pub confirmation_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set only on `Succeeded`.
    pub completed_at: Option<Timestamp>,
    /// When an auto-capture was first requested. At most one per payment.
    #[serde(default)]
    pub capture_requested_at: Option<Timestamp>,
}

impl Payment {
    /// A new Pending payment not yet known to the gateway.
    pub fn new_pending(
        user_id: UserId,
        amount: Money,
        description: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            payment_id: PaymentId::new(),
            gateway_payment_id: None,
            user_id,
            amount,
            status: PaymentStatus::Pending,
            description: description.into(),
            confirmation_url: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            capture_requested_at: None,
        }
    }

    /// True when the payment has left `Pending`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// A Pending payment can be handed back to the user until `ttl` has passed.
    pub fn is_eligible(&self, now: &Timestamp, ttl: Duration) -> bool {
        self.status == PaymentStatus::Pending && now.duration_since(&self.created_at) < ttl
    }

    /// Currency-exact comparison against an observed amount.
    pub fn amount_matches(&self, observed: &Money) -> bool {
        &self.amount == observed
    }

    /// Records the gateway's acceptance of the charge.
    pub fn attach_gateway(
        &mut self,
        gateway_payment_id: impl Into<String>,
        confirmation_url: Option<String>,
        now: Timestamp,
    ) {
        self.gateway_payment_id = Some(gateway_payment_id.into());
        if confirmation_url.is_some() {
            self.confirmation_url = confirmation_url;
        }
        self.updated_at = now;
    }

    /// Stamps the first capture request.
    ///
    /// Returns false when one was already made or the payment has closed.
    pub fn request_capture(&mut self, now: Timestamp) -> bool {
        if self.is_terminal() || self.capture_requested_at.is_some() {
            return false;
        }
        self.capture_requested_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Pending → Succeeded.
    pub fn succeed(&mut self, observed_at: Timestamp, now: Timestamp) -> Result<(), DomainError> {
        self.status = self.status.transition_to(PaymentStatus::Succeeded)?;
        self.completed_at = Some(observed_at);
        self.updated_at = now;
        Ok(())
    }

    /// Pending → Canceled or Failed.
    pub fn close(&mut self, status: PaymentStatus, now: Timestamp) -> Result<(), DomainError> {
        if status == PaymentStatus::Succeeded {
            return Err(DomainError::validation(
                "status",
                "Use succeed() to settle a payment",
            ));
        }
        self.status = self.status.transition_to(status)?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    fn rub(minor: i64) -> Money {
        Money::new(minor, "RUB").unwrap()
    }

    fn pending() -> Payment {
        Payment::new_pending(UserId::new(9), rub(50_000), "30 days", Timestamp::now())
    }

    #[test]
    fn new_payment_is_pending_and_unlinked() {
        let payment = pending();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.gateway_payment_id.is_none());
        assert!(payment.completed_at.is_none());
        assert!(!payment.is_terminal());
    }

    #[test]
    fn succeed_sets_completed_at_to_observation_time() {
        let mut payment = pending();
        let observed_at = Timestamp::now().minus_days(1);

        payment.succeed(observed_at, Timestamp::now()).unwrap();

        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.completed_at, Some(observed_at));
    }

    #[test]
    fn close_leaves_completed_at_unset() {
        let mut payment = pending();
        payment.close(PaymentStatus::Canceled, Timestamp::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Canceled);
        assert!(payment.completed_at.is_none());
    }

    #[test]
    fn close_refuses_success() {
        let mut payment = pending();
        assert!(payment.close(PaymentStatus::Succeeded, Timestamp::now()).is_err());
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[test]
    fn terminal_payment_rejects_second_transition() {
        let mut payment = pending();
        payment.succeed(Timestamp::now(), Timestamp::now()).unwrap();

        let err = payment.close(PaymentStatus::Failed, Timestamp::now()).unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn eligibility_expires_with_ttl() {
        let payment = pending();
        let ttl = Duration::minutes(60);
        assert!(payment.is_eligible(&payment.created_at.plus(Duration::minutes(59)), ttl));
        assert!(!payment.is_eligible(&payment.created_at.plus(Duration::minutes(60)), ttl));
    }

    #[test]
    fn settled_payment_is_never_eligible() {
        let mut payment = pending();
        payment.close(PaymentStatus::Failed, Timestamp::now()).unwrap();
        assert!(!payment.is_eligible(&payment.created_at, Duration::minutes(60)));
    }

    #[test]
    fn amount_match_is_exact() {
        let payment = pending();
        assert!(payment.amount_matches(&rub(50_000)));
        assert!(!payment.amount_matches(&rub(49_999)));
        assert!(!payment.amount_matches(&Money::new(50_000, "USD").unwrap()));
    }

    #[test]
    fn capture_is_requested_once() {
        let mut payment = pending();
        let first = Timestamp::now();

        assert!(payment.request_capture(first));
        assert!(!payment.request_capture(first.plus(Duration::minutes(1))));
        assert_eq!(payment.capture_requested_at, Some(first));
    }

    #[test]
    fn closed_payment_is_not_captured() {
        let mut payment = pending();
        payment.close(PaymentStatus::Canceled, Timestamp::now()).unwrap();
        assert!(!payment.request_capture(Timestamp::now()));
        assert!(payment.capture_requested_at.is_none());
    }

    #[test]
    fn attach_gateway_keeps_existing_url_when_none_given() {
        let mut payment = pending();
        payment.attach_gateway("gw-1", Some("https://pay/1".into()), Timestamp::now());
        payment.attach_gateway("gw-1", None, Timestamp::now());
        assert_eq!(payment.confirmation_url.as_deref(), Some("https://pay/1"));
        assert_eq!(payment.gateway_payment_id.as_deref(), Some("gw-1"));
    }
}
