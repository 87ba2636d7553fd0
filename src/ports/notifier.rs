//! Notification sink port.
//!
//! Fire-and-forget: callers log failures and carry on.

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{NotificationContext, NotificationKind, OperatorAlert};

/// Errors from notification delivery.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Recipient unreachable: {0}")]
    Unreachable(UserId),
}

/// Port for telling subscribers and operators what happened.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), NotifyError>;

    /// Escalation to the people running the channel.
    async fn alert_operators(&self, alert: &OperatorAlert) -> Result<(), NotifyError>;
}
