//! ReminderScheduler - Background job warning subscribers before expiry.
//!
//! For each configured N, a run covers entitlements ending in
//! `(previous run + N days, now + N days]`. The first run looks back one
//! interval. Each window starts where the last successful run ended, so a
//! late or stalled tick widens the next window instead of leaving a gap,
//! and each subscriber gets each reminder once.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, MissedTickBehavior};

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{NotificationContext, NotificationKind, ReconcileError};

use super::reconciliation::ReconciliationEngine;

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Days-before-expiry at which reminders go out.
    pub days: Vec<i64>,
    pub interval: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            days: vec![1, 3, 7],
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    /// Reminders the notifier accepted.
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderScheduler {
    engine: Arc<ReconciliationEngine>,
    config: ReminderConfig,
    /// End of the last successful run; also serialises runs.
    last_run: Mutex<Option<Timestamp>>,
}

impl ReminderScheduler {
    pub fn new(engine: Arc<ReconciliationEngine>, config: ReminderConfig) -> Self {
        Self {
            engine,
            config,
            last_run: Mutex::new(None),
        }
    }

    /// Run the reminder loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Reminder scheduler stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_once(Timestamp::now()).await {
                        tracing::error!(error = %e, "Reminder run failed");
                    }
                }
            }
        }
    }

    /// Sends every reminder whose window ends at `now`.
    pub async fn run_once(&self, now: Timestamp) -> Result<ReminderReport, ReconcileError> {
        let mut last_run = self.last_run.lock().await;
        let since = match *last_run {
            Some(previous) if previous < now => previous,
            Some(_) => return Ok(ReminderReport::default()),
            None => now.minus(
                chrono::Duration::from_std(self.config.interval)
                    .unwrap_or_else(|_| chrono::Duration::days(1)),
            ),
        };
        let mut report = ReminderReport::default();

        for &days in &self.config.days {
            let to = now.plus_days(days);
            let from = since.plus_days(days);
            let users = self
                .engine
                .context()
                .store
                .list_active_users_expiring_between(&from, &to)
                .await
                .map_err(ReconcileError::store_read)?;

            for user in users {
                let delivered = self
                    .engine
                    .notify(
                        user.user_id,
                        NotificationKind::Reminder,
                        NotificationContext::new()
                            .with_entitlement_end(user.entitlement_end)
                            .with_days_left(days),
                    )
                    .await;
                if delivered {
                    report.sent += 1;
                } else {
                    report.failed += 1;
                }
            }
        }
        *last_run = Some(now);

        if report.sent > 0 || report.failed > 0 {
            tracing::info!(sent = report.sent, failed = report.failed, "Expiry reminders sent");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciliation::test_support::Harness;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::EntitlementStatus;
    use crate::ports::EntitlementStore;

    async fn active_until(h: &Harness, id: i64, end: Timestamp) {
        let mut user = h.user(id).await;
        user.entitlement_status = EntitlementStatus::Active;
        user.entitlement_end = Some(end);
        h.store.upsert_user(&user).await.unwrap();
    }

    fn scheduler(h: &Harness) -> ReminderScheduler {
        ReminderScheduler::new(
            h.engine.clone(),
            ReminderConfig {
                days: vec![1, 3],
                interval: Duration::from_secs(60 * 60),
            },
        )
    }

    #[tokio::test]
    async fn users_in_window_are_reminded() {
        let h = Harness::new();
        let now = Timestamp::now();
        active_until(&h, 1, now.plus_days(3).minus(chrono::Duration::minutes(10))).await;
        active_until(&h, 2, now.plus_days(2)).await;

        let report = scheduler(&h).run_once(now).await.unwrap();

        assert_eq!(report.sent, 1);
        let sent = h.notifier.notifications_for(&UserId::new(1));
        assert_eq!(sent[0].kind, NotificationKind::Reminder);
        assert_eq!(sent[0].context.days_left, Some(3));
    }

    #[tokio::test]
    async fn each_window_fires_once_across_runs() {
        let h = Harness::new();
        let now = Timestamp::now();
        active_until(&h, 1, now.plus_days(1).minus(chrono::Duration::minutes(30))).await;
        let scheduler = scheduler(&h);

        scheduler.run_once(now).await.unwrap();
        scheduler
            .run_once(now.plus(chrono::Duration::hours(1)))
            .await
            .unwrap();
        scheduler
            .run_once(now.plus(chrono::Duration::hours(2)))
            .await
            .unwrap();

        assert_eq!(h.notifier.count(NotificationKind::Reminder), 1);
    }

    #[tokio::test]
    async fn late_run_covers_the_ticks_it_missed() {
        let h = Harness::new();
        let now = Timestamp::now();
        active_until(&h, 1, now.plus_days(1).plus(chrono::Duration::minutes(90))).await;
        let scheduler = scheduler(&h);

        scheduler.run_once(now).await.unwrap();
        // Two hourly ticks were lost to a stall.
        let report = scheduler
            .run_once(now.plus(chrono::Duration::hours(3)))
            .await
            .unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(h.notifier.count(NotificationKind::Reminder), 1);
    }

    #[tokio::test]
    async fn undelivered_reminders_are_not_counted_as_sent() {
        let h = Harness::new();
        let now = Timestamp::now();
        active_until(&h, 1, now.plus_days(3).minus(chrono::Duration::minutes(10))).await;
        h.notifier.set_failing(true);

        let report = scheduler(&h).run_once(now).await.unwrap();

        assert_eq!(report, ReminderReport { sent: 0, failed: 1 });
    }

    #[tokio::test]
    async fn repeated_run_at_the_same_instant_sends_nothing() {
        let h = Harness::new();
        let now = Timestamp::now();
        active_until(&h, 1, now.plus_days(1).minus(chrono::Duration::minutes(30))).await;
        let scheduler = scheduler(&h);

        scheduler.run_once(now).await.unwrap();
        let again = scheduler.run_once(now).await.unwrap();

        assert_eq!(again, ReminderReport::default());
        assert_eq!(h.notifier.count(NotificationKind::Reminder), 1);
    }

    #[tokio::test]
    async fn inactive_users_are_not_reminded() {
        let h = Harness::new();
        let now = Timestamp::now();
        let mut user = h.user(1).await;
        user.entitlement_status = EntitlementStatus::Suspended;
        user.entitlement_end = Some(now.plus_days(1));
        h.store.upsert_user(&user).await.unwrap();

        let report = scheduler(&h).run_once(now).await.unwrap();

        assert_eq!(report.sent, 0);
    }
}
