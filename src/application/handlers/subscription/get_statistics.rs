//! GetStatisticsHandler - Admin query for user and revenue figures.

use std::sync::Arc;

use serde::Serialize;

use crate::application::reconciliation::ReconciliationEngine;
use crate::domain::foundation::{DomainError, Money, Timestamp};
use crate::domain::subscription::{PaymentStats, ReconcileError, UserCounts};

/// Figures for the window `(from, to]`.
#[derive(Debug, Clone)]
pub struct GetStatisticsQuery {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl GetStatisticsQuery {
    /// The `days` leading up to `now`.
    pub fn last_days(days: i64, now: Timestamp) -> Self {
        Self {
            from: now.minus_days(days),
            to: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsView {
    pub from: Timestamp,
    pub to: Timestamp,
    /// Current status of every user; not limited to the window.
    pub users: UserCounts,
    pub payments: PaymentStats,
    pub currency: String,
}

impl StatisticsView {
    /// Operator-facing summary.
    pub fn render(&self) -> String {
        let money = |minor: Option<i64>| {
            minor
                .and_then(|m| Money::new(m, &self.currency).ok())
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let conversion = self
            .payments
            .conversion_percent()
            .map(|p| format!("{:.1}%", p))
            .unwrap_or_else(|| "-".to_string());

        format!(
            "Period {} - {} UTC\n\
             Users: {} active, {} trial, {} expired, {} suspended ({} total)\n\
             Payments: {} succeeded, {} failed, {} canceled\n\
             Revenue: {}, average {}, conversion {}",
            self.from.as_datetime().format("%Y-%m-%d %H:%M"),
            self.to.as_datetime().format("%Y-%m-%d %H:%M"),
            self.users.active,
            self.users.trial,
            self.users.expired,
            self.users.suspended,
            self.users.total(),
            self.payments.succeeded,
            self.payments.failed,
            self.payments.canceled,
            money(Some(self.payments.revenue_minor)),
            money(self.payments.average_minor()),
            conversion,
        )
    }
}

pub struct GetStatisticsHandler {
    engine: Arc<ReconciliationEngine>,
}

impl GetStatisticsHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(
        &self,
        query: GetStatisticsQuery,
    ) -> Result<StatisticsView, ReconcileError> {
        if !query.to.is_after(&query.from) {
            return Err(ReconcileError::DomainRule(DomainError::validation(
                "period",
                "Statistics window must end after it starts",
            )));
        }

        let ctx = self.engine.context();
        let users = ctx
            .store
            .count_users_by_status()
            .await
            .map_err(ReconcileError::store_read)?;
        let payments = ctx
            .store
            .payment_stats_between(&query.from, &query.to)
            .await
            .map_err(ReconcileError::store_read)?;

        Ok(StatisticsView {
            from: query.from,
            to: query.to,
            users,
            payments,
            currency: ctx.settings.price.currency().to_string(),
        })
    }
}
