//! Stub channel provider for development and testing.
//!
//! Keeps channel membership in memory. Invite links are numbered, bans
//! remove the member, and `redeem` simulates a user following a link.
//!
//! # Usage
//!
//! ```ignore
//! let channel = StubChannelProvider::new();
//! channel.set_method_error("ban", AccessError::Request("bot kicked".into()));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::ports::{AccessError, ChannelProvider, InviteRequest, MemberPresence};

/// In-memory ChannelProvider with error injection and a call log.
#[derive(Default)]
pub struct StubChannelProvider {
    inner: Arc<Mutex<StubState>>,
}

#[derive(Default)]
struct StubState {
    members: HashSet<UserId>,
    banned: HashSet<UserId>,
    invites: HashMap<String, InviteRequest>,
    revoked: HashSet<String>,
    next_invite: u64,
    method_errors: HashMap<String, AccessError>,
    next_error: Option<AccessError>,
    latency: Option<Duration>,
    call_log: Vec<ProviderCall>,
}

/// Recorded provider call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub method: String,
    pub arg: String,
}

impl StubChannelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Puts a user in the channel directly.
    pub fn add_member(&self, user_id: UserId) {
        self.state().members.insert(user_id);
    }

    /// Simulates a user following an invite link.
    ///
    /// Returns false when the link is unknown, revoked, or the user is banned.
    pub fn redeem(&self, user_id: UserId, invite_link: &str) -> bool {
        let mut state = self.state();
        let valid = state
            .invites
            .get(invite_link)
            .map(|invite| invite.user_id == user_id)
            .unwrap_or(false);
        if !valid || state.revoked.contains(invite_link) || state.banned.contains(&user_id) {
            return false;
        }
        state.members.insert(user_id);
        true
    }

    pub fn set_method_error(&self, method: &str, error: AccessError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Error for the next call to any method (consumed).
    pub fn set_error(&self, error: AccessError) {
        self.state().next_error = Some(error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.state().members.contains(user_id)
    }

    pub fn is_banned(&self, user_id: &UserId) -> bool {
        self.state().banned.contains(user_id)
    }

    pub fn is_revoked(&self, invite_link: &str) -> bool {
        self.state().revoked.contains(invite_link)
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, method: &str, arg: String) -> Result<(), AccessError> {
        let latency = {
            let mut state = self.state();
            state.call_log.push(ProviderCall {
                method: method.to_string(),
                arg,
            });
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        Ok(())
    }
}

impl Clone for StubChannelProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ChannelProvider for StubChannelProvider {
    async fn create_invite(&self, request: InviteRequest) -> Result<String, AccessError> {
        self.enter("create_invite", request.user_id.to_string()).await?;

        let mut state = self.state();
        state.next_invite += 1;
        let link = format!("https://t.me/+stub-{}", state.next_invite);
        state.invites.insert(link.clone(), request);
        Ok(link)
    }

    async fn revoke_invite(&self, invite_link: &str) -> Result<(), AccessError> {
        self.enter("revoke_invite", invite_link.to_string()).await?;

        let mut state = self.state();
        if !state.invites.contains_key(invite_link) {
            return Err(AccessError::Refused(format!("unknown invite {}", invite_link)));
        }
        state.revoked.insert(invite_link.to_string());
        Ok(())
    }

    async fn ban(&self, user_id: &UserId) -> Result<(), AccessError> {
        self.enter("ban", user_id.to_string()).await?;

        let mut state = self.state();
        state.members.remove(user_id);
        state.banned.insert(*user_id);
        Ok(())
    }

    async fn unban(&self, user_id: &UserId) -> Result<(), AccessError> {
        self.enter("unban", user_id.to_string()).await?;

        self.state().banned.remove(user_id);
        Ok(())
    }

    async fn get_member_status(&self, user_id: &UserId) -> Result<MemberPresence, AccessError> {
        self.enter("get_member_status", user_id.to_string()).await?;

        if self.state().members.contains(user_id) {
            Ok(MemberPresence::Present)
        } else {
            Ok(MemberPresence::Absent)
        }
    }
}
