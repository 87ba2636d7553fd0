//! Reconciliation engine tuning

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Locking and store retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Wait for a user's lock before giving up, in seconds
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,

    /// Attempts for a store write on the success path, including the first
    #[serde(default = "default_retry_attempts")]
    pub store_retry_attempts: u32,

    /// First backoff delay in milliseconds; doubles on each retry
    #[serde(default = "default_retry_base")]
    pub store_retry_base_ms: u64,
}

impl ReconciliationConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn store_retry_base(&self) -> Duration {
        Duration::from_millis(self.store_retry_base_ms)
    }

    /// Validate reconciliation configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lock_timeout_secs == 0 {
            return Err(ValidationError::invalid(
                "reconciliation.lock_timeout_secs",
                "must be positive",
            ));
        }
        if !(1..=10).contains(&self.store_retry_attempts) {
            return Err(ValidationError::invalid(
                "reconciliation.store_retry_attempts",
                "must be between 1 and 10",
            ));
        }
        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout(),
            store_retry_attempts: default_retry_attempts(),
            store_retry_base_ms: default_retry_base(),
        }
    }
}

fn default_lock_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_defaults() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.lock_timeout(), Duration::from_secs(10));
        assert_eq!(config.store_retry_attempts, 3);
        assert_eq!(config.store_retry_base(), Duration::from_millis(200));
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let config = ReconciliationConfig {
            store_retry_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
