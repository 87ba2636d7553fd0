//! RecordJoinHandler - Command handler for a channel join event.
//!
//! The channel layer reports which invite link a member came in through.
//! The matching invite is closed so the link cannot be shared onwards.

use std::sync::Arc;

use crate::application::reconciliation::ReconciliationEngine;
use crate::domain::foundation::UserId;
use crate::domain::subscription::ReconcileError;

#[derive(Debug, Clone)]
pub struct RecordJoinCommand {
    pub user_id: UserId,
    pub invite_link: String,
}

pub struct RecordJoinHandler {
    engine: Arc<ReconciliationEngine>,
}

impl RecordJoinHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    /// Returns false when the link is not one of the user's open invites.
    pub async fn handle(&self, cmd: RecordJoinCommand) -> Result<bool, ReconcileError> {
        let matched = self
            .engine
            .access()
            .mark_invite_used(cmd.user_id, &cmd.invite_link)
            .await?;

        if matched {
            tracing::info!(user_id = %cmd.user_id, "Member joined through invite");
        } else {
            tracing::warn!(user_id = %cmd.user_id, "Join through an unknown or closed invite");
        }
        Ok(matched)
    }
}
