//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CHANNEL_GATE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use channel_gate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Plan price: {} {}", config.subscription.price_minor, config.subscription.currency);
//! ```

mod database;
mod error;
mod payment;
mod reconciliation;
mod server;
mod subscription;
mod sweeper;
mod telegram;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use reconciliation::ReconciliationConfig;
pub use server::{Environment, ServerConfig};
pub use subscription::SubscriptionConfig;
pub use sweeper::SweeperConfig;
pub use telegram::TelegramConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment and logging
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// The plan being sold
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Payment configuration (YooKassa)
    pub payment: PaymentConfig,

    /// Bot and channel
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Expiry sweeps and reminders
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Locking and retries
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CHANNEL_GATE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CHANNEL_GATE__SUBSCRIPTION__PRICE_MINOR=50000` -> `subscription.price_minor = 50000`
    /// - `CHANNEL_GATE__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CHANNEL_GATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Production additionally requires an HTTPS return URL and a webhook
    /// secret.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.subscription.validate()?;
        self.payment.validate()?;
        self.telegram.validate()?;
        self.sweeper.validate()?;
        self.reconciliation.validate()?;
        if self.is_production() {
            self.payment.validate_production()?;
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set environment variables for testing
    /// Uses double underscores to separate nested config values
    fn set_minimal_env() {
        env::set_var("CHANNEL_GATE__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("CHANNEL_GATE__PAYMENT__YOOKASSA_SHOP_ID", "123456");
        env::set_var("CHANNEL_GATE__PAYMENT__YOOKASSA_SECRET_KEY", "test_secret");
    }

    /// Helper to clear environment variables after testing
    fn clear_env() {
        env::remove_var("CHANNEL_GATE__DATABASE__URL");
        env::remove_var("CHANNEL_GATE__PAYMENT__YOOKASSA_SHOP_ID");
        env::remove_var("CHANNEL_GATE__PAYMENT__YOOKASSA_SECRET_KEY");
        env::remove_var("CHANNEL_GATE__PAYMENT__WEBHOOK_SECRET");
        env::remove_var("CHANNEL_GATE__SERVER__ENVIRONMENT");
        env::remove_var("CHANNEL_GATE__SUBSCRIPTION__PRICE_MINOR");
        env::remove_var("CHANNEL_GATE__SWEEPER__REMINDER_DAYS");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.payment.yookassa_shop_id, "123456");
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_section_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.subscription.price_minor, 50_000);
        assert_eq!(config.payment.pending_ttl_minutes, 60);
        assert_eq!(config.sweeper.concurrency, 4);
        assert_eq!(config.reconciliation.store_retry_attempts, 3);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CHANNEL_GATE__SUBSCRIPTION__PRICE_MINOR", "99000");
        env::set_var("CHANNEL_GATE__SWEEPER__REMINDER_DAYS", "2,5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.subscription.price_minor, 99_000);
        assert_eq!(config.sweeper.reminder_day_list(), vec![2, 5]);
    }

    #[test]
    fn test_production_requires_webhook_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CHANNEL_GATE__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::WebhookSecretRequired)
        ));
    }
}
