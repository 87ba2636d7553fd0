//! Access Controller - channel membership derived from entitlement.
//!
//! Grants are invite links, never direct adds: the user joins by redeeming
//! the link. Revocation bans then immediately unbans, which removes the
//! member without blocking a later rejoin, and invalidates every invite that
//! is still open so a rejoin needs a fresh grant.
//!
//! Every provider call is bounded by the configured access timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{InviteToken, ReconcileError};
use crate::ports::{AccessError, ChannelProvider, EntitlementStore, InviteRequest, MemberPresence};

use super::context::ReconcileContext;

/// Result of an advisory membership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Member,
    NotMember,
    /// The provider could not be asked. Never read as "not a member".
    Unknown,
}

pub struct AccessController {
    store: Arc<dyn EntitlementStore>,
    channel: Arc<dyn ChannelProvider>,
    invite_ttl: chrono::Duration,
    call_timeout: Duration,
}

impl AccessController {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        channel: Arc<dyn ChannelProvider>,
        invite_ttl: chrono::Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            channel,
            invite_ttl,
            call_timeout,
        }
    }

    pub fn from_context(ctx: &ReconcileContext) -> Self {
        Self::new(
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.channel),
            ctx.settings.invite_ttl,
            ctx.settings.access_timeout,
        )
    }

    /// Issues and persists a single-use invite for the user.
    pub async fn grant(&self, user_id: UserId) -> Result<InviteToken, ReconcileError> {
        let now = Timestamp::now();
        let expires_at = now.plus(self.invite_ttl);

        let link = self
            .bounded(
                "create_invite",
                self.channel.create_invite(InviteRequest {
                    user_id,
                    expires_at,
                    member_limit: InviteToken::MEMBER_LIMIT,
                    name: format!("subscriber {}", user_id),
                }),
            )
            .await?;

        let invite = InviteToken::issued(user_id, link, expires_at, now);
        self.store
            .save_invite(&invite)
            .await
            .map_err(ReconcileError::store_write)?;

        tracing::info!(
            user_id = %user_id,
            expires_at = %expires_at.as_datetime(),
            "Access granted"
        );
        Ok(invite)
    }

    /// Removes the user from the channel and closes their open invites.
    ///
    /// Invite revocation is best-effort; the ban/unban pair is not.
    pub async fn revoke(&self, user_id: UserId) -> Result<(), ReconcileError> {
        let now = Timestamp::now();
        match self.store.list_open_invites(&user_id, &now).await {
            Ok(invites) => {
                for mut invite in invites {
                    if let Err(e) = self
                        .bounded("revoke_invite", self.channel.revoke_invite(&invite.token))
                        .await
                    {
                        tracing::warn!(
                            user_id = %user_id,
                            error = %e,
                            "Failed to revoke invite at provider"
                        );
                    }
                    invite.mark_revoked();
                    if let Err(e) = self.store.save_invite(&invite).await {
                        tracing::warn!(
                            user_id = %user_id,
                            error = %e,
                            "Failed to mark invite revoked"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not list open invites");
            }
        }

        self.bounded("ban", self.channel.ban(&user_id)).await?;
        self.bounded("unban", self.channel.unban(&user_id)).await?;

        tracing::info!(user_id = %user_id, "Access revoked");
        Ok(())
    }

    /// Advisory membership lookup.
    pub async fn check_membership(&self, user_id: UserId) -> MembershipStatus {
        match self
            .bounded("get_member_status", self.channel.get_member_status(&user_id))
            .await
        {
            Ok(MemberPresence::Present) => MembershipStatus::Member,
            Ok(MemberPresence::Absent) => MembershipStatus::NotMember,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Membership check failed");
                MembershipStatus::Unknown
            }
        }
    }

    /// Records that the user joined through `token`.
    ///
    /// Returns false when the token is not one of the user's open invites.
    pub async fn mark_invite_used(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<bool, ReconcileError> {
        let now = Timestamp::now();
        let invites = self
            .store
            .list_open_invites(&user_id, &now)
            .await
            .map_err(ReconcileError::store_read)?;

        let Some(mut invite) = invites.into_iter().find(|i| i.token == token) else {
            return Ok(false);
        };
        invite.mark_used();
        self.store
            .save_invite(&invite)
            .await
            .map_err(ReconcileError::store_write)?;
        Ok(true)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, AccessError>>,
    ) -> Result<T, ReconcileError> {
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AccessError::Timeout(self.call_timeout.as_secs())),
        };
        result.map_err(|e| ReconcileError::AccessProviderFailure(format!("{}: {}", operation, e)))
    }
}
