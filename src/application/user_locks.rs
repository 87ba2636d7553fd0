//! Keyed async mutex serialising work on one user.
//!
//! Every read-modify-write of a user's entitlement or of one of their
//! payments happens while holding that user's guard. Different users never
//! contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::domain::foundation::UserId;
use crate::domain::subscription::ReconcileError;

/// Held for the duration of a per-user critical section.
pub struct UserLockGuard {
    user_id: UserId,
    _guard: OwnedMutexGuard<()>,
}

impl UserLockGuard {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Weak<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to `timeout` for the user's lock.
    pub async fn acquire(
        &self,
        user_id: UserId,
        timeout: Duration,
    ) -> Result<UserLockGuard, ReconcileError> {
        let lock = self.lock_for(user_id);
        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(UserLockGuard {
                user_id,
                _guard: guard,
            }),
            Err(_) => {
                tracing::warn!(
                    user_id = %user_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "User lock timed out"
                );
                Err(ReconcileError::LockTimeout(user_id))
            }
        }
    }

    /// Number of users with a live lock (held or awaited).
    pub fn tracked(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|w| w.strong_count() > 0).count()
    }

    fn lock_for(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = locks.get(&user_id).and_then(Weak::upgrade) {
            return existing;
        }

        // Drop entries whose last holder is gone.
        locks.retain(|_, weak| weak.strong_count() > 0);

        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(user_id, Arc::downgrade(&lock));
        lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn same_user_is_exclusive() {
        let locks = UserLocks::new();
        let user = UserId::new(1);

        let _held = locks.acquire(user, WAIT).await.unwrap();
        let second = locks.acquire(user, WAIT).await;

        assert!(matches!(second, Err(ReconcileError::LockTimeout(id)) if id == user));
    }

    #[tokio::test]
    async fn different_users_do_not_contend() {
        let locks = UserLocks::new();
        let _a = locks.acquire(UserId::new(1), WAIT).await.unwrap();
        let b = locks.acquire(UserId::new(2), WAIT).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired() {
        let locks = UserLocks::new();
        let user = UserId::new(1);

        drop(locks.acquire(user, WAIT).await.unwrap());

        let again = locks.acquire(user, WAIT).await.unwrap();
        assert_eq!(again.user_id(), user);
    }

    #[tokio::test]
    async fn entries_are_pruned_after_release() {
        let locks = UserLocks::new();
        for id in 0..10 {
            drop(locks.acquire(UserId::new(id), WAIT).await.unwrap());
        }
        assert_eq!(locks.tracked(), 0);

        let _held = locks.acquire(UserId::new(99), WAIT).await.unwrap();
        assert_eq!(locks.tracked(), 1);
        assert!(locks.locks.lock().unwrap().len() <= 2);
    }
}
