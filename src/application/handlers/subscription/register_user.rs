//! RegisterUserHandler - Command handler for a user's first contact.

use std::sync::Arc;

use crate::application::reconciliation::{ReconciliationEngine, Registration};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::ReconcileError;

#[derive(Debug, Clone)]
pub struct RegisterUserCommand {
    pub user_id: UserId,
}

pub struct RegisterUserHandler {
    engine: Arc<ReconciliationEngine>,
}

impl RegisterUserHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, cmd: RegisterUserCommand) -> Result<Registration, ReconcileError> {
        self.engine
            .register_user(cmd.user_id, Timestamp::now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciliation::test_support::Harness;
    use crate::ports::EntitlementStore;

    #[tokio::test]
    async fn registers_once() {
        let h = Harness::new();
        let handler = RegisterUserHandler::new(h.engine.clone());
        let cmd = RegisterUserCommand {
            user_id: UserId::new(3),
        };

        assert!(handler.handle(cmd.clone()).await.unwrap().created);
        assert!(!handler.handle(cmd).await.unwrap().created);
        assert!(h.store.get_user(&UserId::new(3)).await.unwrap().is_some());
    }
}
