//! Payment status observations from polls and webhooks.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Money, Timestamp};

use super::PaymentStatus;

/// A payment status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedStatus {
    Pending,
    /// Authorized but not yet captured.
    WaitingForCapture,
    Succeeded,
    Canceled,
    Failed,
}

impl ObservedStatus {
    /// Maps a gateway status string. Unknown values yield `None`.
    pub fn from_gateway(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(ObservedStatus::Pending),
            "waiting_for_capture" => Some(ObservedStatus::WaitingForCapture),
            "succeeded" => Some(ObservedStatus::Succeeded),
            "canceled" | "cancelled" => Some(ObservedStatus::Canceled),
            "failed" => Some(ObservedStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObservedStatus::Pending => "pending",
            ObservedStatus::WaitingForCapture => "waiting_for_capture",
            ObservedStatus::Succeeded => "succeeded",
            ObservedStatus::Canceled => "canceled",
            ObservedStatus::Failed => "failed",
        }
    }

    /// The terminal payment status this observation settles to, if any.
    pub fn terminal_status(&self) -> Option<PaymentStatus> {
        match self {
            ObservedStatus::Succeeded => Some(PaymentStatus::Succeeded),
            ObservedStatus::Canceled => Some(PaymentStatus::Canceled),
            ObservedStatus::Failed => Some(PaymentStatus::Failed),
            ObservedStatus::Pending | ObservedStatus::WaitingForCapture => None,
        }
    }
}

impl std::fmt::Display for ObservedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One assertion about a payment's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub status: ObservedStatus,
    /// Amount reported alongside the status. Required for `Succeeded`.
    pub amount: Option<Money>,
    pub observed_at: Timestamp,
    /// Gateway id reported by the source, attached to the payment if missing.
    pub gateway_payment_id: Option<String>,
}

impl Observation {
    pub fn new(status: ObservedStatus, observed_at: Timestamp) -> Self {
        Self {
            status,
            amount: None,
            observed_at,
            gateway_payment_id: None,
        }
    }

    pub fn succeeded(amount: Money, observed_at: Timestamp) -> Self {
        Self::new(ObservedStatus::Succeeded, observed_at).with_amount(amount)
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_gateway_id(mut self, gateway_payment_id: impl Into<String>) -> Self {
        self.gateway_payment_id = Some(gateway_payment_id.into());
        self
    }
}
