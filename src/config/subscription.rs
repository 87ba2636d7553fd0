//! Subscription plan configuration

use serde::Deserialize;

use super::error::ValidationError;

/// The single plan sold by the bot
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// Price in minor units (kopecks for RUB)
    #[serde(default = "default_price_minor")]
    pub price_minor: i64,

    /// ISO 4217 currency code
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Days added per successful payment
    #[serde(default = "default_duration_days")]
    pub duration_days: i64,

    /// Trial granted on registration; 0 disables trials
    #[serde(default)]
    pub trial_days: i64,

    /// Description shown on the payment page
    #[serde(default = "default_description")]
    pub description: String,
}

impl SubscriptionConfig {
    /// Validate subscription configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price_minor <= 0 {
            return Err(ValidationError::invalid("subscription.price_minor", "must be positive"));
        }
        let currency_ok = self.currency.len() == 3
            && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !currency_ok {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        if !(1..=366).contains(&self.duration_days) {
            return Err(ValidationError::invalid(
                "subscription.duration_days",
                "must be between 1 and 366",
            ));
        }
        if !(0..=90).contains(&self.trial_days) {
            return Err(ValidationError::invalid(
                "subscription.trial_days",
                "must be between 0 and 90",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingRequired("SUBSCRIPTION__DESCRIPTION"));
        }
        Ok(())
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            price_minor: default_price_minor(),
            currency: default_currency(),
            duration_days: default_duration_days(),
            trial_days: 0,
            description: default_description(),
        }
    }
}

fn default_price_minor() -> i64 {
    50_000
}

fn default_currency() -> String {
    "RUB".to_string()
}

fn default_duration_days() -> i64 {
    30
}

fn default_description() -> String {
    "Channel subscription, 30 days".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_defaults() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.price_minor, 50_000);
        assert_eq!(config.currency, "RUB");
        assert_eq!(config.duration_days, 30);
        assert_eq!(config.trial_days, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_free_plan() {
        let config = SubscriptionConfig {
            price_minor: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_lowercase_currency() {
        let config = SubscriptionConfig {
            currency: "rub".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_duration() {
        let config = SubscriptionConfig {
            duration_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
