//! Entitlement and payment status state machines.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};

/// Where a user stands with respect to channel access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// No current entitlement. The default for new users.
    Expired,

    /// Paid entitlement, valid while `entitlement_end` is in the future.
    Active,

    /// Complimentary period granted at registration.
    Trial,

    /// Revoked by an operator or by a refund.
    Suspended,
}

impl EntitlementStatus {
    /// Stable storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Expired => "expired",
            EntitlementStatus::Active => "active",
            EntitlementStatus::Trial => "trial",
            EntitlementStatus::Suspended => "suspended",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.to_ascii_lowercase().as_str() {
            "expired" => Ok(EntitlementStatus::Expired),
            "active" => Ok(EntitlementStatus::Active),
            "trial" => Ok(EntitlementStatus::Trial),
            "suspended" => Ok(EntitlementStatus::Suspended),
            other => Err(ValidationError::invalid_format(
                "entitlement_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for EntitlementStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use EntitlementStatus::*;
        matches!(
            (self, target),
            // From EXPIRED
            (Expired, Active)
                | (Expired, Trial)
                | (Expired, Suspended)
            // From TRIAL
                | (Trial, Active)
                | (Trial, Expired)
                | (Trial, Suspended)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, Expired)
                | (Active, Suspended)
            // From SUSPENDED
                | (Suspended, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use EntitlementStatus::*;
        match self {
            Expired => vec![Active, Trial, Suspended],
            Trial => vec![Active, Expired, Suspended],
            Active => vec![Active, Expired, Suspended],
            Suspended => vec![Active],
        }
    }
}

/// Lifecycle of a single payment.
///
/// Everything except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Canceled,
    Failed,
}

impl PaymentStatus {
    /// Stable storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "canceled" | "cancelled" => Ok(PaymentStatus::Canceled),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Succeeded) | (Pending, Canceled) | (Pending, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Succeeded, Canceled, Failed],
            Succeeded | Canceled | Failed => vec![],
        }
    }
}
