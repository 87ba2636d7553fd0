//! ExpirySweeper - Background job demoting lapsed subscriptions.
//!
//! Each tick lists Active users whose entitlement has ended and, for each:
//! 1. Re-checks, expires and revokes channel access under their lock
//! 2. Alerts operators when the member could not be removed
//! 3. Sends the "expired" notification
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 1h | Time between sweeps |
//! | `concurrency` | 4 | Users processed at once |
//!
//! Only one sweep runs at a time; a tick that finds one in progress is
//! skipped.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, MissedTickBehavior};

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    AlertKind, NotificationContext, NotificationKind, OperatorAlert, ReconcileError,
};

use super::reconciliation::{ExpiryOutcome, ReconciliationEngine};

/// Configuration for the ExpirySweeper.
#[derive(Debug, Clone)]
pub struct ExpirySweeperConfig {
    pub interval: Duration,
    pub concurrency: usize,
}

impl Default for ExpirySweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            concurrency: 4,
        }
    }
}

impl ExpirySweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    /// Renewed or changed between listing and processing.
    pub skipped: usize,
    pub failed: usize,
    /// Expired users still in the channel.
    pub revoke_failures: usize,
}

impl SweepReport {
    fn needs_attention(&self) -> bool {
        self.expired > 0 || self.failed > 0 || self.revoke_failures > 0
    }
}

enum UserSweep {
    Expired { revoked: bool },
    Skipped,
    Failed,
}

pub struct ExpirySweeper {
    engine: Arc<ReconciliationEngine>,
    config: ExpirySweeperConfig,
    running: Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<ReconciliationEngine>, config: ExpirySweeperConfig) -> Self {
        Self {
            engine,
            config,
            running: Mutex::new(()),
        }
    }

    /// Run the sweep loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            concurrency = self.config.concurrency,
            "Expiry sweeper started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Expiry sweeper stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.sweep(Timestamp::now()).await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
            }
        }
    }

    /// Runs one sweep. Returns `None` when another sweep is still running.
    pub async fn sweep(&self, now: Timestamp) -> Result<Option<SweepReport>, ReconcileError> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!("Previous sweep still running, skipping");
            return Ok(None);
        };

        let users = self
            .engine
            .context()
            .store
            .list_expired_active_users(&now)
            .await
            .map_err(ReconcileError::store_read)?;

        let mut report = SweepReport {
            examined: users.len(),
            ..Default::default()
        };

        let results: Vec<UserSweep> = stream::iter(users)
            .map(|user| self.sweep_user(user.user_id, now))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                UserSweep::Expired { revoked } => {
                    report.expired += 1;
                    if !revoked {
                        report.revoke_failures += 1;
                    }
                }
                UserSweep::Skipped => report.skipped += 1,
                UserSweep::Failed => report.failed += 1,
            }
        }

        tracing::info!(
            examined = report.examined,
            expired = report.expired,
            skipped = report.skipped,
            failed = report.failed,
            revoke_failures = report.revoke_failures,
            "Expiry sweep finished"
        );
        if report.needs_attention() {
            self.engine
                .alert(OperatorAlert::new(
                    AlertKind::SweepSummary,
                    format!(
                        "Sweep expired {} of {} users ({} failed, {} still in channel)",
                        report.expired, report.examined, report.failed, report.revoke_failures
                    ),
                ))
                .await;
        }

        Ok(Some(report))
    }

    async fn sweep_user(&self, user_id: UserId, now: Timestamp) -> UserSweep {
        let (user, revoke_error) = match self.engine.expire_if_due(user_id, now).await {
            Ok(ExpiryOutcome::Expired { user, revoke_error }) => (user, revoke_error),
            Ok(ExpiryOutcome::Skipped) => return UserSweep::Skipped,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Could not expire user");
                return UserSweep::Failed;
            }
        };

        if let Some(e) = &revoke_error {
            self.engine
                .alert(
                    OperatorAlert::new(
                        AlertKind::AccessRevocationFailed,
                        format!("Expired user {} could not be removed: {}", user_id, e),
                    )
                    .for_user(user_id),
                )
                .await;
        }

        self.engine
            .notify(
                user_id,
                NotificationKind::Expired,
                NotificationContext::new().with_entitlement_end(user.entitlement_end),
            )
            .await;

        UserSweep::Expired {
            revoked: revoke_error.is_none(),
        }
    }
}
