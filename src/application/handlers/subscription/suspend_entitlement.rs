//! SuspendEntitlementHandler - Admin command revoking a subscription.

use std::sync::Arc;

use crate::application::reconciliation::ReconciliationEngine;
use crate::domain::foundation::UserId;
use crate::domain::subscription::{ReconcileError, User};

#[derive(Debug, Clone)]
pub struct SuspendEntitlementCommand {
    pub user_id: UserId,
    pub reason: String,
}

pub struct SuspendEntitlementHandler {
    engine: Arc<ReconciliationEngine>,
}

impl SuspendEntitlementHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, cmd: SuspendEntitlementCommand) -> Result<User, ReconcileError> {
        self.engine
            .suspend_entitlement(cmd.user_id, &cmd.reason)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciliation::test_support::Harness;
    use crate::ports::EntitlementStore;

    #[tokio::test]
    async fn suspension_is_recorded_in_history() {
        let h = Harness::new();
        h.user(3).await;
        let handler = SuspendEntitlementHandler::new(h.engine.clone());

        handler
            .handle(SuspendEntitlementCommand {
                user_id: UserId::new(3),
                reason: "chargeback".to_string(),
            })
            .await
            .unwrap();

        let history = h.store.history_for(&UserId::new(3)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "chargeback");
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let h = Harness::new();
        let handler = SuspendEntitlementHandler::new(h.engine.clone());

        let result = handler
            .handle(SuspendEntitlementCommand {
                user_id: UserId::new(404),
                reason: "x".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ReconcileError::UserNotFound(_))));
    }
}
