//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool size must be positive and min_connections must not exceed max_connections")]
    InvalidPoolSize,

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Return URL must use HTTPS in production")]
    ReturnUrlMustBeHttps,

    #[error("Webhook secret is required in production")]
    WebhookSecretRequired,
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
