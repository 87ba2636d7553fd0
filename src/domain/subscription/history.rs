//! Append-only record of entitlement changes.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, Timestamp, UserId, ValidationError};

/// What happened to an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementAction {
    TrialStarted,
    Activated,
    Extended,
    Expired,
    Suspended,
}

impl EntitlementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementAction::TrialStarted => "trial_started",
            EntitlementAction::Activated => "activated",
            EntitlementAction::Extended => "extended",
            EntitlementAction::Expired => "expired",
            EntitlementAction::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "trial_started" => Ok(EntitlementAction::TrialStarted),
            "activated" => Ok(EntitlementAction::Activated),
            "extended" => Ok(EntitlementAction::Extended),
            "expired" => Ok(EntitlementAction::Expired),
            "suspended" => Ok(EntitlementAction::Suspended),
            other => Err(ValidationError::invalid_format(
                "entitlement_action",
                format!("unknown action '{}'", other),
            )),
        }
    }
}

/// One row of entitlement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementChange {
    pub user_id: UserId,
    pub action: EntitlementAction,
    pub previous_end: Option<Timestamp>,
    pub new_end: Option<Timestamp>,
    /// Payment that caused the change, if any.
    pub payment_id: Option<PaymentId>,
    pub reason: String,
    pub recorded_at: Timestamp,
}

impl EntitlementChange {
    pub fn new(
        user_id: UserId,
        action: EntitlementAction,
        previous_end: Option<Timestamp>,
        new_end: Option<Timestamp>,
        reason: impl Into<String>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            action,
            previous_end,
            new_end,
            payment_id: None,
            reason: reason.into(),
            recorded_at,
        }
    }

    /// Links the change to the payment that caused it.
    pub fn caused_by(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_parse_back() {
        for action in [
            EntitlementAction::TrialStarted,
            EntitlementAction::Activated,
            EntitlementAction::Extended,
            EntitlementAction::Expired,
            EntitlementAction::Suspended,
        ] {
            assert_eq!(EntitlementAction::parse(action.as_str()), Ok(action));
        }
    }

    #[test]
    fn caused_by_attaches_payment() {
        let payment_id = PaymentId::new();
        let change = EntitlementChange::new(
            UserId::new(1),
            EntitlementAction::Activated,
            None,
            Some(Timestamp::now()),
            "payment",
            Timestamp::now(),
        )
        .caused_by(payment_id);
        assert_eq!(change.payment_id, Some(payment_id));
    }
}
