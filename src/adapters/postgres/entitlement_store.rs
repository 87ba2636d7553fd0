//! PostgreSQL implementation of EntitlementStore.
//!
//! Upserts use `ON CONFLICT ... DO UPDATE` so every write replaces the full
//! row in one statement. `record_transition` wraps its three writes in a
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Money, PaymentId, Timestamp, UserId};
use crate::domain::subscription::{
    EntitlementAction, EntitlementChange, EntitlementStatus, InviteToken, Payment, PaymentStats,
    PaymentStatus, User, UserCounts,
};
use crate::ports::EntitlementStore;

/// PostgreSQL implementation of the EntitlementStore port.
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Rows
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    entitlement_status: String,
    entitlement_end: Option<DateTime<Utc>>,
    total_payments: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            user_id: UserId::new(row.user_id),
            entitlement_status: EntitlementStatus::parse(&row.entitlement_status)
                .map_err(corrupt)?,
            entitlement_end: row.entitlement_end.map(Timestamp::from_datetime),
            total_payments: u32::try_from(row.total_payments).map_err(|_| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid total_payments: {}", row.total_payments),
                )
            })?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    gateway_payment_id: Option<String>,
    user_id: i64,
    amount_minor: i64,
    currency: String,
    status: String,
    description: String,
    confirmation_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    capture_requested_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            payment_id: PaymentId::from_uuid(row.payment_id),
            gateway_payment_id: row.gateway_payment_id,
            user_id: UserId::new(row.user_id),
            amount: Money::new(row.amount_minor, &row.currency).map_err(corrupt)?,
            status: PaymentStatus::parse(&row.status).map_err(corrupt)?,
            description: row.description,
            confirmation_url: row.confirmation_url,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            completed_at: row.completed_at.map(Timestamp::from_datetime),
            capture_requested_at: row.capture_requested_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InviteRow {
    token: String,
    user_id: i64,
    expires_at: DateTime<Utc>,
    member_limit: i32,
    used: bool,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl From<InviteRow> for InviteToken {
    fn from(row: InviteRow) -> Self {
        InviteToken {
            user_id: UserId::new(row.user_id),
            token: row.token,
            expires_at: Timestamp::from_datetime(row.expires_at),
            member_limit: u32::try_from(row.member_limit).unwrap_or(InviteToken::MEMBER_LIMIT),
            used: row.used,
            revoked: row.revoked,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    user_id: i64,
    action: String,
    previous_end: Option<DateTime<Utc>>,
    new_end: Option<DateTime<Utc>>,
    payment_id: Option<Uuid>,
    reason: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for EntitlementChange {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(EntitlementChange {
            user_id: UserId::new(row.user_id),
            action: EntitlementAction::parse(&row.action).map_err(corrupt)?,
            previous_end: row.previous_end.map(Timestamp::from_datetime),
            new_end: row.new_end.map(Timestamp::from_datetime),
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            reason: row.reason,
            recorded_at: Timestamp::from_datetime(row.recorded_at),
        })
    }
}

fn corrupt(err: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored value: {}", err))
}

/// Maps a sqlx error, naming the violated constraint when there is one.
fn db_error(operation: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if let Some(constraint) = db_err.constraint() {
            return DomainError::database(
                operation,
                format!("constraint {} violated", constraint),
            )
            .with_detail("constraint", constraint);
        }
    }
    DomainError::database(operation, e)
}

// ════════════════════════════════════════════════════════════════════════════════
// Statements shared by single writes and transactions
// ════════════════════════════════════════════════════════════════════════════════

const USER_COLUMNS: &str =
    "user_id, entitlement_status, entitlement_end, total_payments, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "payment_id, gateway_payment_id, user_id, amount_minor, currency, \
     status, description, confirmation_url, created_at, updated_at, completed_at, \
     capture_requested_at";

async fn write_user<'e, E>(executor: E, user: &User) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO users (
            user_id, entitlement_status, entitlement_end, total_payments, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            entitlement_status = EXCLUDED.entitlement_status,
            entitlement_end = EXCLUDED.entitlement_end,
            total_payments = EXCLUDED.total_payments,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(user.user_id.as_i64())
    .bind(user.entitlement_status.as_str())
    .bind(user.entitlement_end.map(|t| *t.as_datetime()))
    .bind(i64::from(user.total_payments))
    .bind(user.created_at.as_datetime())
    .bind(user.updated_at.as_datetime())
    .execute(executor)
    .await?;
    Ok(())
}

async fn write_payment<'e, E>(executor: E, payment: &Payment) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO payments (
            payment_id, gateway_payment_id, user_id, amount_minor, currency, status,
            description, confirmation_url, created_at, updated_at, completed_at,
            capture_requested_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (payment_id) DO UPDATE SET
            gateway_payment_id = EXCLUDED.gateway_payment_id,
            status = EXCLUDED.status,
            confirmation_url = EXCLUDED.confirmation_url,
            updated_at = EXCLUDED.updated_at,
            completed_at = EXCLUDED.completed_at,
            capture_requested_at = EXCLUDED.capture_requested_at
        "#,
    )
    .bind(payment.payment_id.as_uuid())
    .bind(&payment.gateway_payment_id)
    .bind(payment.user_id.as_i64())
    .bind(payment.amount.minor_units())
    .bind(payment.amount.currency())
    .bind(payment.status.as_str())
    .bind(&payment.description)
    .bind(&payment.confirmation_url)
    .bind(payment.created_at.as_datetime())
    .bind(payment.updated_at.as_datetime())
    .bind(payment.completed_at.map(|t| *t.as_datetime()))
    .bind(payment.capture_requested_at.map(|t| *t.as_datetime()))
    .execute(executor)
    .await?;
    Ok(())
}

async fn write_history<'e, E>(executor: E, change: &EntitlementChange) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO entitlement_history (
            user_id, action, previous_end, new_end, payment_id, reason, recorded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(change.user_id.as_i64())
    .bind(change.action.as_str())
    .bind(change.previous_end.map(|t| *t.as_datetime()))
    .bind(change.new_end.map(|t| *t.as_datetime()))
    .bind(change.payment_id.map(|id| *id.as_uuid()))
    .bind(&change.reason)
    .bind(change.recorded_at.as_datetime())
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find user", e))?;

        row.map(User::try_from).transpose()
    }

    async fn upsert_user(&self, user: &User) -> Result<(), DomainError> {
        write_user(&self.pool, user)
            .await
            .map_err(|e| db_error("upsert user", e))
    }

    async fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn upsert_payment(&self, payment: &Payment) -> Result<(), DomainError> {
        write_payment(&self.pool, payment)
            .await
            .map_err(|e| db_error("upsert payment", e))
    }

    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE gateway_payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find payment by gateway id", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_pending_payment(&self, user_id: &UserId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payments
            WHERE user_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find pending payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn list_expired_active_users(&self, now: &Timestamp) -> Result<Vec<User>, DomainError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM users
            WHERE entitlement_status = 'active' AND entitlement_end < $1
            ORDER BY user_id
            "#,
            USER_COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list expired users", e))?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn list_active_users_expiring_between(
        &self,
        from: &Timestamp,
        to: &Timestamp,
    ) -> Result<Vec<User>, DomainError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM users
            WHERE entitlement_status = 'active'
              AND entitlement_end > $1
              AND entitlement_end <= $2
            ORDER BY user_id
            "#,
            USER_COLUMNS
        ))
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list expiring users", e))?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn record_transition(
        &self,
        user: &User,
        payment: Option<&Payment>,
        change: &EntitlementChange,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transition", e))?;

        write_user(&mut *tx, user)
            .await
            .map_err(|e| db_error("record transition", e))?;
        if let Some(payment) = payment {
            write_payment(&mut *tx, payment)
                .await
                .map_err(|e| db_error("record transition", e))?;
        }
        write_history(&mut *tx, change)
            .await
            .map_err(|e| db_error("record transition", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit transition", e))
    }

    async fn save_invite(&self, invite: &InviteToken) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO invite_tokens (
                token, user_id, expires_at, member_limit, used, revoked, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (token) DO UPDATE SET
                used = EXCLUDED.used,
                revoked = EXCLUDED.revoked
            "#,
        )
        .bind(&invite.token)
        .bind(invite.user_id.as_i64())
        .bind(invite.expires_at.as_datetime())
        .bind(i32::try_from(invite.member_limit).unwrap_or(1))
        .bind(invite.used)
        .bind(invite.revoked)
        .bind(invite.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("save invite", e))?;

        Ok(())
    }

    async fn list_open_invites(
        &self,
        user_id: &UserId,
        now: &Timestamp,
    ) -> Result<Vec<InviteToken>, DomainError> {
        let rows: Vec<InviteRow> = sqlx::query_as(
            r#"
            SELECT token, user_id, expires_at, member_limit, used, revoked, created_at
            FROM invite_tokens
            WHERE user_id = $1 AND NOT used AND NOT revoked AND expires_at > $2
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_i64())
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list open invites", e))?;

        Ok(rows.into_iter().map(InviteToken::from).collect())
    }

    async fn history_for(&self, user_id: &UserId) -> Result<Vec<EntitlementChange>, DomainError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT user_id, action, previous_end, new_end, payment_id, reason, recorded_at
            FROM entitlement_history
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load history", e))?;

        rows.into_iter().map(EntitlementChange::try_from).collect()
    }

    async fn count_users_by_status(&self) -> Result<UserCounts, DomainError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT entitlement_status, COUNT(*)
            FROM users
            GROUP BY entitlement_status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("count users", e))?;

        let mut counts = UserCounts::default();
        for (status, count) in rows {
            let status = EntitlementStatus::parse(&status).map_err(corrupt)?;
            counts.add(status, u64::try_from(count).map_err(corrupt)?);
        }
        Ok(counts)
    }

    async fn payment_stats_between(
        &self,
        from: &Timestamp,
        to: &Timestamp,
    ) -> Result<PaymentStats, DomainError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(amount_minor), 0)::BIGINT
            FROM payments
            WHERE status <> 'pending' AND updated_at > $1 AND updated_at <= $2
            GROUP BY status
            "#,
        )
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("payment statistics", e))?;

        let mut stats = PaymentStats::default();
        for (status, count, amount_minor) in rows {
            let status = PaymentStatus::parse(&status).map_err(corrupt)?;
            stats.add(status, u64::try_from(count).map_err(corrupt)?, amount_minor);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn user_row_converts() {
        let end = now();
        let user = User::try_from(UserRow {
            user_id: 42,
            entitlement_status: "active".to_string(),
            entitlement_end: Some(end),
            total_payments: 3,
            created_at: now(),
            updated_at: now(),
        })
        .unwrap();

        assert_eq!(user.user_id, UserId::new(42));
        assert_eq!(user.entitlement_status, EntitlementStatus::Active);
        assert_eq!(user.entitlement_end, Some(Timestamp::from_datetime(end)));
        assert_eq!(user.total_payments, 3);
    }

    #[test]
    fn user_row_rejects_unknown_status() {
        let err = User::try_from(UserRow {
            user_id: 1,
            entitlement_status: "banned".to_string(),
            entitlement_end: None,
            total_payments: 0,
            created_at: now(),
            updated_at: now(),
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn user_row_rejects_negative_counter() {
        let result = User::try_from(UserRow {
            user_id: 1,
            entitlement_status: "expired".to_string(),
            entitlement_end: None,
            total_payments: -1,
            created_at: now(),
            updated_at: now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn payment_row_converts_money_exactly() {
        let id = Uuid::new_v4();
        let payment = Payment::try_from(PaymentRow {
            payment_id: id,
            gateway_payment_id: Some("gw-1".to_string()),
            user_id: 7,
            amount_minor: 50_000,
            currency: "RUB".to_string(),
            status: "succeeded".to_string(),
            description: "30 days".to_string(),
            confirmation_url: None,
            created_at: now(),
            updated_at: now(),
            completed_at: Some(now()),
            capture_requested_at: None,
        })
        .unwrap();

        assert_eq!(payment.payment_id, PaymentId::from_uuid(id));
        assert_eq!(payment.amount, Money::new(50_000, "RUB").unwrap());
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn history_row_converts() {
        let change = EntitlementChange::try_from(HistoryRow {
            user_id: 7,
            action: "trial_started".to_string(),
            previous_end: None,
            new_end: Some(now()),
            payment_id: None,
            reason: "registration".to_string(),
            recorded_at: now(),
        })
        .unwrap();
        assert_eq!(change.action, EntitlementAction::TrialStarted);
    }

    #[test]
    fn db_error_without_constraint_keeps_message() {
        let err = db_error("upsert user", sqlx::Error::PoolTimedOut);
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.contains("upsert user"));
    }
}
