//! Telegram channel adapter.
//!
//! Implements `ChannelProvider` with the Bot API through `teloxide`. The bot
//! must be an administrator of the channel with the "invite users" and
//! "ban users" rights.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId as TelegramUserId};
use teloxide::RequestError;

use crate::domain::foundation::UserId;
use crate::ports::{AccessError, ChannelProvider, InviteRequest, MemberPresence};

/// Channel membership through a Telegram bot.
pub struct TelegramChannel {
    bot: Bot,
    channel_id: ChatId,
}

impl TelegramChannel {
    pub fn new(bot: Bot, channel_id: i64) -> Self {
        Self {
            bot,
            channel_id: ChatId(channel_id),
        }
    }
}

/// Telegram user ids are positive; ours are stored signed.
fn telegram_user(user_id: &UserId) -> Result<TelegramUserId, AccessError> {
    u64::try_from(user_id.as_i64())
        .map(TelegramUserId)
        .map_err(|_| AccessError::Refused(format!("Invalid Telegram user id {}", user_id)))
}

fn request_error(e: RequestError) -> AccessError {
    match e {
        RequestError::Api(api) => AccessError::Refused(api.to_string()),
        other => AccessError::Request(other.to_string()),
    }
}

#[async_trait]
impl ChannelProvider for TelegramChannel {
    async fn create_invite(&self, request: InviteRequest) -> Result<String, AccessError> {
        let link = self
            .bot
            .create_chat_invite_link(self.channel_id)
            .name(request.name)
            .expire_date(*request.expires_at.as_datetime())
            .member_limit(request.member_limit)
            .await
            .map_err(request_error)?;

        tracing::info!(user_id = %request.user_id, "Invite link created");
        Ok(link.invite_link)
    }

    async fn revoke_invite(&self, invite_link: &str) -> Result<(), AccessError> {
        self.bot
            .revoke_chat_invite_link(self.channel_id, invite_link)
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn ban(&self, user_id: &UserId) -> Result<(), AccessError> {
        self.bot
            .ban_chat_member(self.channel_id, telegram_user(user_id)?)
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn unban(&self, user_id: &UserId) -> Result<(), AccessError> {
        self.bot
            .unban_chat_member(self.channel_id, telegram_user(user_id)?)
            .only_if_banned(true)
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn get_member_status(&self, user_id: &UserId) -> Result<MemberPresence, AccessError> {
        let member = self
            .bot
            .get_chat_member(self.channel_id, telegram_user(user_id)?)
            .await
            .map_err(request_error)?;

        if member.kind.is_present() {
            Ok(MemberPresence::Present)
        } else {
            Ok(MemberPresence::Absent)
        }
    }
}
