//! Channel membership provider port.
//!
//! Raw membership operations against the messaging platform. Only the
//! access controller calls the mutating methods.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

/// Errors from channel provider operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
    #[error("Channel provider request failed: {0}")]
    Request(String),

    #[error("Channel provider timed out after {0}s")]
    Timeout(u64),

    #[error("Channel provider refused: {0}")]
    Refused(String),
}

/// Parameters for a new invite link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRequest {
    pub user_id: UserId,
    pub expires_at: Timestamp,
    pub member_limit: u32,
    /// Label shown to channel admins.
    pub name: String,
}

/// Whether a user currently sits in the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberPresence {
    Present,
    Absent,
}

/// Port for the messaging platform's channel administration API.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Creates an invite link and returns it.
    async fn create_invite(&self, request: InviteRequest) -> Result<String, AccessError>;

    /// Invalidates a previously created link.
    async fn revoke_invite(&self, invite_link: &str) -> Result<(), AccessError>;

    /// Removes the user from the channel.
    async fn ban(&self, user_id: &UserId) -> Result<(), AccessError>;

    /// Lifts a ban so the user can rejoin through a new invite.
    async fn unban(&self, user_id: &UserId) -> Result<(), AccessError>;

    async fn get_member_status(&self, user_id: &UserId) -> Result<MemberPresence, AccessError>;
}
