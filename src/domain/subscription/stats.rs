//! Aggregates behind the operator statistics report.

use serde::Serialize;

use crate::domain::foundation::Money;

use super::{EntitlementStatus, PaymentStatus};

/// Users per entitlement status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub active: u64,
    pub trial: u64,
    pub expired: u64,
    pub suspended: u64,
}

impl UserCounts {
    pub fn add(&mut self, status: EntitlementStatus, count: u64) {
        let slot = match status {
            EntitlementStatus::Active => &mut self.active,
            EntitlementStatus::Trial => &mut self.trial,
            EntitlementStatus::Expired => &mut self.expired,
            EntitlementStatus::Suspended => &mut self.suspended,
        };
        *slot += count;
    }

    pub fn total(&self) -> u64 {
        self.active + self.trial + self.expired + self.suspended
    }
}

/// Payments that were closed within a reporting window.
///
/// Every payment is charged in the configured currency, so revenue is kept
/// as a plain sum of minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentStats {
    pub succeeded: u64,
    pub failed: u64,
    pub canceled: u64,
    /// Sum over succeeded payments.
    pub revenue_minor: i64,
}

impl PaymentStats {
    /// Folds in `count` payments of one status. Pending payments are not closed
    /// and are ignored.
    pub fn add(&mut self, status: PaymentStatus, count: u64, amount_minor: i64) {
        match status {
            PaymentStatus::Succeeded => {
                self.succeeded += count;
                self.revenue_minor += amount_minor;
            }
            PaymentStatus::Failed => self.failed += count,
            PaymentStatus::Canceled => self.canceled += count,
            PaymentStatus::Pending => {}
        }
    }

    pub fn closed(&self) -> u64 {
        self.succeeded + self.failed + self.canceled
    }

    /// Share of closed payments that succeeded, in percent.
    pub fn conversion_percent(&self) -> Option<f64> {
        match self.closed() {
            0 => None,
            closed => Some(self.succeeded as f64 * 100.0 / closed as f64),
        }
    }

    /// Mean succeeded amount, rounded down to a minor unit.
    pub fn average_minor(&self) -> Option<i64> {
        i64::try_from(self.succeeded)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.revenue_minor / n)
    }

    pub fn revenue(&self, currency: &str) -> Option<Money> {
        Money::new(self.revenue_minor, currency).ok()
    }
}
