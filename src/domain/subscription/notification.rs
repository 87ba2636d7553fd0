//! Notification kinds and operator alerts.
//!
//! Rendering is left to adapters; the domain only says what happened.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Money, PaymentId, Timestamp, UserId};

/// Events a subscriber is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Welcome,
    Activated,
    Extended,
    Expired,
    Cancelled,
    PaymentFailed,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Welcome => "welcome",
            NotificationKind::Activated => "activated",
            NotificationKind::Extended => "extended",
            NotificationKind::Expired => "expired",
            NotificationKind::Cancelled => "cancelled",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::Reminder => "reminder",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts an adapter may use when rendering a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub entitlement_end: Option<Timestamp>,
    pub days_left: Option<i64>,
    pub invite_link: Option<String>,
    pub amount: Option<Money>,
    pub reason: Option<String>,
}

impl NotificationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entitlement_end(mut self, end: Option<Timestamp>) -> Self {
        self.entitlement_end = end;
        self
    }

    pub fn with_days_left(mut self, days: i64) -> Self {
        self.days_left = Some(days);
        self
    }

    pub fn with_invite_link(mut self, link: impl Into<String>) -> Self {
        self.invite_link = Some(link.into());
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Why operators are being paged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Observed amount differs from the stored one; needs manual review.
    AmountMismatch,
    /// A successful payment could not be persisted after all retries.
    StoreWriteExhausted,
    /// Membership could not be removed; needs manual reconciliation.
    AccessRevocationFailed,
    SweepSummary,
    /// Periodic user and revenue figures.
    Statistics,
}

/// A message for the operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAlert {
    pub kind: AlertKind,
    pub message: String,
    pub user_id: Option<UserId>,
    pub payment_id: Option<PaymentId>,
}

impl OperatorAlert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            user_id: None,
            payment_id: None,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn for_payment(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builder_sets_fields() {
        let ctx = NotificationContext::new()
            .with_days_left(3)
            .with_invite_link("https://t.me/+x")
            .with_reason("refund");
        assert_eq!(ctx.days_left, Some(3));
        assert_eq!(ctx.invite_link.as_deref(), Some("https://t.me/+x"));
        assert_eq!(ctx.reason.as_deref(), Some("refund"));
        assert!(ctx.amount.is_none());
    }

    #[test]
    fn alert_links_user_and_payment() {
        let payment_id = PaymentId::new();
        let alert = OperatorAlert::new(AlertKind::AmountMismatch, "check it")
            .for_user(UserId::new(4))
            .for_payment(payment_id);
        assert_eq!(alert.user_id, Some(UserId::new(4)));
        assert_eq!(alert.payment_id, Some(payment_id));
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(NotificationKind::PaymentFailed.to_string(), "payment_failed");
    }
}
