//! Dependencies and settings shared by every reconciliation path.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::domain::foundation::{DomainError, Money};
use crate::ports::{ChannelProvider, EntitlementStore, Notifier, PaymentGateway};

use super::reconciliation::RetryPolicy;
use super::user_locks::UserLocks;

/// Tunables for the reconciliation paths.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Price of one subscription period.
    pub price: Money,
    pub description: String,
    /// Days added per successful payment.
    pub period_days: i64,
    /// Trial granted on registration; 0 disables it.
    pub trial_days: i64,
    /// Pending payments older than this are not handed back.
    pub pending_ttl: chrono::Duration,
    pub gateway_timeout: Duration,
    pub lock_timeout: Duration,
    pub store_retry: RetryPolicy,
    pub invite_ttl: chrono::Duration,
    pub access_timeout: Duration,
}

impl ReconcileSettings {
    /// Defaults for everything but the price.
    pub fn new(price: Money) -> Self {
        Self {
            price,
            description: "Channel subscription, 30 days".to_string(),
            period_days: 30,
            trial_days: 0,
            pending_ttl: chrono::Duration::minutes(60),
            gateway_timeout: Duration::from_secs(10),
            lock_timeout: Duration::from_secs(10),
            store_retry: RetryPolicy::default(),
            invite_ttl: chrono::Duration::hours(24),
            access_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, DomainError> {
        let subscription = &config.subscription;
        let price = Money::new(subscription.price_minor, &subscription.currency)?;

        Ok(Self {
            price,
            description: subscription.description.clone(),
            period_days: subscription.duration_days,
            trial_days: subscription.trial_days,
            pending_ttl: chrono::Duration::minutes(config.payment.pending_ttl_minutes),
            gateway_timeout: Duration::from_secs(config.payment.call_timeout_secs),
            lock_timeout: config.reconciliation.lock_timeout(),
            store_retry: RetryPolicy::new(
                config.reconciliation.store_retry_attempts,
                config.reconciliation.store_retry_base(),
            ),
            invite_ttl: chrono::Duration::hours(config.telegram.invite_ttl_hours),
            access_timeout: Duration::from_secs(config.telegram.call_timeout_secs),
        })
    }
}

/// Ports, locks and settings bundled for the engine and its jobs.
#[derive(Clone)]
pub struct ReconcileContext {
    pub store: Arc<dyn EntitlementStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub channel: Arc<dyn ChannelProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub locks: Arc<UserLocks>,
    pub settings: ReconcileSettings,
}

impl ReconcileContext {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        gateway: Arc<dyn PaymentGateway>,
        channel: Arc<dyn ChannelProvider>,
        notifier: Arc<dyn Notifier>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            channel,
            notifier,
            locks: Arc::new(UserLocks::new()),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseConfig, PaymentConfig, ReconciliationConfig, ServerConfig, SubscriptionConfig,
        SweeperConfig, TelegramConfig,
    };

    fn app_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            subscription: SubscriptionConfig {
                price_minor: 99_000,
                duration_days: 31,
                trial_days: 3,
                ..Default::default()
            },
            payment: PaymentConfig::default(),
            telegram: TelegramConfig::default(),
            sweeper: SweeperConfig::default(),
            reconciliation: ReconciliationConfig {
                store_retry_attempts: 5,
                ..Default::default()
            },
        }
    }

    #[test]
    fn settings_follow_config() {
        let settings = ReconcileSettings::from_config(&app_config()).unwrap();

        assert_eq!(settings.price, Money::new(99_000, "RUB").unwrap());
        assert_eq!(settings.period_days, 31);
        assert_eq!(settings.trial_days, 3);
        assert_eq!(settings.pending_ttl, chrono::Duration::minutes(60));
        assert_eq!(settings.store_retry.attempts, 5);
        assert_eq!(settings.invite_ttl, chrono::Duration::hours(24));
    }

    #[test]
    fn invalid_currency_is_rejected() {
        let mut config = app_config();
        config.subscription.currency = String::new();
        assert!(ReconcileSettings::from_config(&config).is_err());
    }
}
