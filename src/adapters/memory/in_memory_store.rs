//! In-memory entitlement store.
//!
//! Backs tests and embedded use. All state sits behind one async `RwLock`,
//! so `record_transition` is atomic with respect to every reader.
//!
//! Mirrors the schema's constraints: a non-null gateway id is unique and a
//! payment's owner must exist.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::subscription::{
    EntitlementChange, EntitlementStatus, InviteToken, Payment, PaymentStats, PaymentStatus, User,
    UserCounts,
};
use crate::ports::EntitlementStore;

#[derive(Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    payments: HashMap<PaymentId, Payment>,
    invites: Vec<InviteToken>,
    history: Vec<EntitlementChange>,
}

impl StoreState {
    /// `incoming_owner` is a user written in the same unit as the payment.
    fn check_payment(
        &self,
        payment: &Payment,
        incoming_owner: Option<UserId>,
    ) -> Result<(), DomainError> {
        let owner_known = incoming_owner == Some(payment.user_id)
            || self.users.contains_key(&payment.user_id);
        if !owner_known {
            return Err(DomainError::database(
                "upsert payment",
                "constraint payments_user_id_fkey violated",
            )
            .with_detail("constraint", "payments_user_id_fkey"));
        }
        if let Some(gateway_id) = &payment.gateway_payment_id {
            let taken = self.payments.values().any(|p| {
                p.payment_id != payment.payment_id
                    && p.gateway_payment_id.as_deref() == Some(gateway_id.as_str())
            });
            if taken {
                return Err(DomainError::database(
                    "upsert payment",
                    "constraint payments_gateway_payment_id_key violated",
                )
                .with_detail("constraint", "payments_gateway_payment_id_key"));
            }
        }
        Ok(())
    }
}

/// Entitlement store held entirely in memory.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryEntitlementStore::new());
/// store.upsert_user(&User::register(UserId::new(1), Timestamp::now())).await?;
///
/// // Make the next two writes fail
/// store.fail_next_writes(2);
/// ```
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    state: RwLock<StoreState>,
    failing_writes: AtomicUsize,
    write_count: AtomicUsize,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// The next `n` write operations fail with `DatabaseError`.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub async fn payments_for(&self, user_id: &UserId) -> Vec<Payment> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        payments
    }

    pub async fn invites_for(&self, user_id: &UserId) -> Vec<InviteToken> {
        let state = self.state.read().await;
        state
            .invites
            .iter()
            .filter(|i| &i.user_id == user_id)
            .cloned()
            .collect()
    }

    fn begin_write(&self, operation: &str) -> Result<(), DomainError> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DomainError::database(operation, "injected failure"));
        }
        Ok(())
    }

    fn commit(&self) {
        self.write_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), DomainError> {
        self.begin_write("upsert user")?;
        self.state.write().await.users.insert(user.user_id, user.clone());
        self.commit();
        Ok(())
    }

    async fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.state.read().await.payments.get(payment_id).cloned())
    }

    async fn upsert_payment(&self, payment: &Payment) -> Result<(), DomainError> {
        self.begin_write("upsert payment")?;
        let mut state = self.state.write().await;
        state.check_payment(payment, None)?;
        state.payments.insert(payment.payment_id, payment.clone());
        self.commit();
        Ok(())
    }

    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    async fn find_pending_payment(&self, user_id: &UserId) -> Result<Option<Payment>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| &p.user_id == user_id && p.status == PaymentStatus::Pending)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list_expired_active_users(&self, now: &Timestamp) -> Result<Vec<User>, DomainError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.is_lapsed_at(now))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.user_id);
        Ok(users)
    }

    async fn list_active_users_expiring_between(
        &self,
        from: &Timestamp,
        to: &Timestamp,
    ) -> Result<Vec<User>, DomainError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| {
                u.entitlement_status == EntitlementStatus::Active
                    && u
                        .entitlement_end
                        .is_some_and(|end| end.is_after(from) && !end.is_after(to))
            })
            .cloned()
            .collect();
        users.sort_by_key(|u| u.user_id);
        Ok(users)
    }

    async fn record_transition(
        &self,
        user: &User,
        payment: Option<&Payment>,
        change: &EntitlementChange,
    ) -> Result<(), DomainError> {
        self.begin_write("record transition")?;
        let mut state = self.state.write().await;
        if let Some(payment) = payment {
            state.check_payment(payment, Some(user.user_id))?;
            state.payments.insert(payment.payment_id, payment.clone());
        }
        state.users.insert(user.user_id, user.clone());
        state.history.push(change.clone());
        self.commit();
        Ok(())
    }

    async fn save_invite(&self, invite: &InviteToken) -> Result<(), DomainError> {
        self.begin_write("save invite")?;
        let mut state = self.state.write().await;
        match state.invites.iter_mut().find(|i| i.token == invite.token) {
            Some(existing) => *existing = invite.clone(),
            None => state.invites.push(invite.clone()),
        }
        self.commit();
        Ok(())
    }

    async fn list_open_invites(
        &self,
        user_id: &UserId,
        now: &Timestamp,
    ) -> Result<Vec<InviteToken>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .invites
            .iter()
            .filter(|i| &i.user_id == user_id && i.is_open(now))
            .cloned()
            .collect())
    }

    async fn history_for(&self, user_id: &UserId) -> Result<Vec<EntitlementChange>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_users_by_status(&self) -> Result<UserCounts, DomainError> {
        let state = self.state.read().await;
        let mut counts = UserCounts::default();
        for user in state.users.values() {
            counts.add(user.entitlement_status, 1);
        }
        Ok(counts)
    }

    async fn payment_stats_between(
        &self,
        from: &Timestamp,
        to: &Timestamp,
    ) -> Result<PaymentStats, DomainError> {
        let state = self.state.read().await;
        let mut stats = PaymentStats::default();
        for payment in state.payments.values() {
            if payment.is_terminal()
                && payment.updated_at.is_after(from)
                && !payment.updated_at.is_after(to)
            {
                stats.add(payment.status, 1, payment.amount.minor_units());
            }
        }
        Ok(stats)
    }
}
