//! Single-use, time-bounded channel invites.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

/// An invite link issued to exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteToken {
    pub user_id: UserId,
    /// The invite link as returned by the channel provider.
    pub token: String,
    pub expires_at: Timestamp,
    pub member_limit: u32,
    pub used: bool,
    pub revoked: bool,
    pub created_at: Timestamp,
}

impl InviteToken {
    pub const MEMBER_LIMIT: u32 = 1;

    pub fn issued(
        user_id: UserId,
        token: impl Into<String>,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            user_id,
            token: token.into(),
            expires_at,
            member_limit: Self::MEMBER_LIMIT,
            used: false,
            revoked: false,
            created_at: now,
        }
    }

    /// Still redeemable at `now`.
    pub fn is_open(&self, now: &Timestamp) -> bool {
        !self.used && !self.revoked && self.expires_at.is_after(now)
    }

    pub fn mark_used(&mut self) {
        self.used = true;
    }

    pub fn mark_revoked(&mut self) {
        self.revoked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(now: Timestamp) -> InviteToken {
        InviteToken::issued(UserId::new(3), "https://t.me/+abc", now.plus_days(1), now)
    }

    #[test]
    fn issued_token_admits_one_member() {
        let now = Timestamp::now();
        let invite = token(now);
        assert_eq!(invite.member_limit, 1);
        assert!(invite.is_open(&now));
    }

    #[test]
    fn used_or_revoked_tokens_are_closed() {
        let now = Timestamp::now();
        let mut used = token(now);
        used.mark_used();
        let mut revoked = token(now);
        revoked.mark_revoked();

        assert!(!used.is_open(&now));
        assert!(!revoked.is_open(&now));
    }

    #[test]
    fn token_closes_at_expiry() {
        let now = Timestamp::now();
        let invite = token(now);
        assert!(!invite.is_open(&invite.expires_at));
    }
}
