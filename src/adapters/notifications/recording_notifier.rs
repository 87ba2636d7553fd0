//! Notifier that records everything it is asked to send.
//!
//! Used in tests and when running without a bot token. Delivery can be made
//! to fail so callers' fire-and-forget handling can be exercised.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{NotificationContext, NotificationKind, OperatorAlert};
use crate::ports::{Notifier, NotifyError};

/// A notification as it was handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub context: NotificationContext,
}

#[derive(Default)]
struct Recorded {
    notifications: Vec<SentNotification>,
    alerts: Vec<OperatorAlert>,
    failing: bool,
}

#[derive(Default, Clone)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail after recording it.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    pub fn notifications(&self) -> Vec<SentNotification> {
        self.state().notifications.clone()
    }

    pub fn notifications_for(&self, user_id: &UserId) -> Vec<SentNotification> {
        self.state()
            .notifications
            .iter()
            .filter(|n| &n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.state()
            .notifications
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }

    pub fn alerts(&self) -> Vec<OperatorAlert> {
        self.state().alerts.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.notifications.clear();
        state.alerts.clear();
    }

    fn state(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), NotifyError> {
        tracing::debug!(user_id = %user_id, kind = %kind, "Notification recorded");

        let mut state = self.state();
        state.notifications.push(SentNotification {
            user_id: *user_id,
            kind,
            context: context.clone(),
        });
        if state.failing {
            return Err(NotifyError::Unreachable(*user_id));
        }
        Ok(())
    }

    async fn alert_operators(&self, alert: &OperatorAlert) -> Result<(), NotifyError> {
        let mut state = self.state();
        state.alerts.push(alert.clone());
        if state.failing {
            return Err(NotifyError::Delivery("recording notifier set to fail".into()));
        }
        Ok(())
    }
}
