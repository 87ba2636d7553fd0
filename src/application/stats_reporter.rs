//! StatsReporter - Background job sending periodic figures to operators.
//!
//! Each report covers the interval that just ended and goes out as a
//! `Statistics` operator alert. The first report is due one interval after
//! start-up.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{AlertKind, OperatorAlert, ReconcileError};

use super::handlers::subscription::{GetStatisticsHandler, GetStatisticsQuery, StatisticsView};
use super::reconciliation::ReconciliationEngine;

#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Time between reports; also the window each one covers.
    pub interval: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

pub struct StatsReporter {
    engine: Arc<ReconciliationEngine>,
    statistics: GetStatisticsHandler,
    config: StatsConfig,
}

impl StatsReporter {
    pub fn new(engine: Arc<ReconciliationEngine>, config: StatsConfig) -> Self {
        Self {
            statistics: GetStatisticsHandler::new(Arc::clone(&engine)),
            engine,
            config,
        }
    }

    /// Run the report loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Stats reporter stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.report(Timestamp::now()).await {
                        tracing::error!(error = %e, "Statistics report failed");
                    }
                }
            }
        }
    }

    /// Sends the figures for the interval ending at `now`.
    pub async fn report(&self, now: Timestamp) -> Result<StatisticsView, ReconcileError> {
        let width = chrono::Duration::from_std(self.config.interval)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let view = self
            .statistics
            .handle(GetStatisticsQuery {
                from: now.minus(width),
                to: now,
            })
            .await?;

        self.engine
            .alert(OperatorAlert::new(AlertKind::Statistics, view.render()))
            .await;
        tracing::info!(
            users = view.users.total(),
            succeeded = view.payments.succeeded,
            revenue_minor = view.payments.revenue_minor,
            "Statistics reported"
        );
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciliation::test_support::Harness;
    use crate::domain::subscription::PaymentStatus;
    use crate::ports::EntitlementStore;

    #[tokio::test]
    async fn report_goes_to_operators() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut payment = h.pending_payment(1).await;
        payment.close(PaymentStatus::Failed, now).unwrap();
        h.store.upsert_payment(&payment).await.unwrap();
        let reporter = StatsReporter::new(h.engine.clone(), StatsConfig::default());

        let view = reporter.report(now).await.unwrap();

        assert_eq!(view.payments.failed, 1);
        let alerts = h.notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Statistics);
        assert!(alerts[0].message.contains("0 succeeded, 1 failed"));
    }

    #[tokio::test]
    async fn window_matches_the_interval() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut payment = h.pending_payment(1).await;
        payment.close(PaymentStatus::Canceled, now.minus_days(2)).unwrap();
        h.store.upsert_payment(&payment).await.unwrap();
        let reporter = StatsReporter::new(h.engine.clone(), StatsConfig::default());

        let view = reporter.report(now).await.unwrap();

        assert_eq!(view.payments.closed(), 0);
        assert_eq!(view.from, now.minus_days(1));
    }

    #[tokio::test]
    async fn undelivered_report_is_still_returned() {
        let h = Harness::new();
        h.notifier.set_failing(true);
        let reporter = StatsReporter::new(h.engine.clone(), StatsConfig::default());

        assert!(reporter.report(Timestamp::now()).await.is_ok());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let h = Harness::new();
        let reporter = StatsReporter::new(
            h.engine.clone(),
            StatsConfig {
                interval: Duration::from_millis(10),
            },
        );
        let (tx, rx) = watch::channel(false);

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        };
        tokio::join!(reporter.run(rx), stopper);

        assert!(!h.notifier.alerts().is_empty());
    }
}
