//! Payment gateway configuration

use serde::Deserialize;

use super::error::ValidationError;

/// YooKassa configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// YooKassa shop id
    #[serde(default)]
    pub yookassa_shop_id: String,

    /// YooKassa secret key
    #[serde(default)]
    pub yookassa_secret_key: String,

    /// API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Where the hosted payment page returns the user
    #[serde(default = "default_return_url")]
    pub return_url: String,

    /// Age after which a Pending payment is no longer handed back
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_minutes: i64,

    /// HMAC secret for notification signatures
    pub webhook_secret: Option<String>,

    /// Deadline for every gateway call in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl PaymentConfig {
    /// Check if pointed at a local or mock gateway
    pub fn is_custom_endpoint(&self) -> bool {
        self.api_base_url != default_api_base_url()
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.yookassa_shop_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__YOOKASSA_SHOP_ID"));
        }
        if self.yookassa_secret_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__YOOKASSA_SECRET_KEY"));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(ValidationError::invalid("payment.api_base_url", "must be an http(s) URL"));
        }
        if self.pending_ttl_minutes <= 0 {
            return Err(ValidationError::invalid(
                "payment.pending_ttl_minutes",
                "must be positive",
            ));
        }
        if self.call_timeout_secs == 0 || self.call_timeout_secs > 120 {
            return Err(ValidationError::invalid(
                "payment.call_timeout_secs",
                "must be between 1 and 120",
            ));
        }
        Ok(())
    }

    /// Production additionally requires HTTPS and signed notifications
    pub fn validate_production(&self) -> Result<(), ValidationError> {
        if !self.return_url.starts_with("https://") {
            return Err(ValidationError::ReturnUrlMustBeHttps);
        }
        if self.webhook_secret.as_deref().unwrap_or("").is_empty() {
            return Err(ValidationError::WebhookSecretRequired);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            yookassa_shop_id: String::new(),
            yookassa_secret_key: String::new(),
            api_base_url: default_api_base_url(),
            return_url: default_return_url(),
            pending_ttl_minutes: default_pending_ttl(),
            webhook_secret: None,
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.yookassa.ru/v3".to_string()
}

fn default_return_url() -> String {
    "https://t.me/".to_string()
}

fn default_pending_ttl() -> i64 {
    60
}

fn default_call_timeout() -> u64 {
    10
}
