//! ExtendEntitlementHandler - Admin command granting extra days.

use std::sync::Arc;

use crate::application::reconciliation::ReconciliationEngine;
use crate::domain::foundation::UserId;
use crate::domain::subscription::{ReconcileError, User};

#[derive(Debug, Clone)]
pub struct ExtendEntitlementCommand {
    pub user_id: UserId,
    pub days: i64,
    pub reason: String,
}

/// Handler for manual extensions.
///
/// Days are added on top of any time left, with the same rule as renewals.
pub struct ExtendEntitlementHandler {
    engine: Arc<ReconciliationEngine>,
}

impl ExtendEntitlementHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, cmd: ExtendEntitlementCommand) -> Result<User, ReconcileError> {
        self.engine
            .extend_entitlement(cmd.user_id, cmd.days, &cmd.reason)
            .await
    }
}
