//! Entitlement store port.
//!
//! Durable storage for users, payments, invite tokens and entitlement
//! history. The store is the single source of truth; every other component
//! reads from it and writes through the reconciliation engine.
//!
//! # Design
//!
//! - **Full-record upserts**: last writer wins, keyed by primary id.
//!   Callers read-modify-write under the per-user lock.
//! - **Atomic rows**: no partially updated record is ever visible.
//! - **Unique gateway ids**: a second payment with the same non-null
//!   `gateway_payment_id` is rejected with a `DatabaseError` naming the
//!   constraint.
//!
//! # Example
//!
//! ```ignore
//! async fn mark_canceled(
//!     store: &dyn EntitlementStore,
//!     payment_id: &PaymentId,
//! ) -> Result<(), DomainError> {
//!     let Some(mut payment) = store.get_payment(payment_id).await? else {
//!         return Ok(());
//!     };
//!     payment.close(PaymentStatus::Canceled, Timestamp::now())?;
//!     store.upsert_payment(&payment).await
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::subscription::{
    EntitlementChange, InviteToken, Payment, PaymentStats, User, UserCounts,
};

/// Repository port for subscription state.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Returns `None` if the user has never been seen.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, DomainError>;

    /// Inserts or replaces the user row.
    async fn upsert_user(&self, user: &User) -> Result<(), DomainError>;

    async fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Inserts or replaces the payment row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` when `gateway_payment_id` is already taken by
    ///   another payment, or the owner does not exist
    async fn upsert_payment(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Webhook-path lookup.
    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// The newest Pending payment of the user, whatever its age.
    async fn find_pending_payment(&self, user_id: &UserId) -> Result<Option<Payment>, DomainError>;

    /// Users with `status = Active` and `entitlement_end < now`.
    async fn list_expired_active_users(&self, now: &Timestamp) -> Result<Vec<User>, DomainError>;

    /// Active users whose entitlement ends in `(from, to]`.
    async fn list_active_users_expiring_between(
        &self,
        from: &Timestamp,
        to: &Timestamp,
    ) -> Result<Vec<User>, DomainError>;

    /// Writes the user, the optional payment and the history row as one unit.
    ///
    /// Either all three become visible or none does.
    async fn record_transition(
        &self,
        user: &User,
        payment: Option<&Payment>,
        change: &EntitlementChange,
    ) -> Result<(), DomainError>;

    /// Inserts or replaces an invite token, keyed by its link.
    async fn save_invite(&self, invite: &InviteToken) -> Result<(), DomainError>;

    /// Tokens of the user that are neither used, revoked nor expired at `now`.
    async fn list_open_invites(
        &self,
        user_id: &UserId,
        now: &Timestamp,
    ) -> Result<Vec<InviteToken>, DomainError>;

    /// History of the user, oldest first.
    async fn history_for(&self, user_id: &UserId) -> Result<Vec<EntitlementChange>, DomainError>;

    /// Number of users in each entitlement status.
    async fn count_users_by_status(&self) -> Result<UserCounts, DomainError>;

    /// Payments that left Pending with `updated_at` in `(from, to]`.
    async fn payment_stats_between(
        &self,
        from: &Timestamp,
        to: &Timestamp,
    ) -> Result<PaymentStats, DomainError>;
}
