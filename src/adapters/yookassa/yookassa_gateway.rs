//! YooKassa payment gateway adapter.
//!
//! Implements `PaymentGateway` against the YooKassa v3 REST API.
//!
//! # Protocol
//!
//! - HTTP basic auth with shop id and secret key
//! - `Idempotence-Key` header set to the internal payment id
//! - Amounts as decimal strings (`"500.00"`)
//! - One-stage payments (`capture: true`) with redirect confirmation
//!
//! # Configuration
//!
//! ```ignore
//! let config = YooKassaConfig::new(shop_id, secret_key, "https://t.me/my_bot");
//! let gateway = YooKassaGateway::new(config);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{PaymentId, UserId};
use crate::domain::subscription::ObservedStatus;
use crate::ports::{
    CreatePaymentRequest, GatewayError, GatewayErrorCode, GatewayMetadata, GatewayPayment,
    GatewayPaymentStatus, PaymentGateway,
};

use super::api_types::{
    ConfirmationRequest, CreatePaymentBody, YooKassaAmount, YooKassaErrorBody, YooKassaPayment,
    METADATA_PAYMENT_ID, METADATA_USER_ID,
};

const DEFAULT_API_BASE_URL: &str = "https://api.yookassa.ru/v3";

/// YooKassa API configuration.
#[derive(Clone)]
pub struct YooKassaConfig {
    shop_id: String,

    /// Secret key from the merchant dashboard.
    secret_key: SecretString,

    /// Where the hosted page sends the user after paying.
    return_url: String,

    /// Base URL for the API (default: https://api.yookassa.ru/v3).
    api_base_url: String,

    /// Deadline for every HTTP call.
    timeout: Duration,
}

impl YooKassaConfig {
    pub fn new(
        shop_id: impl Into<String>,
        secret_key: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            secret_key: SecretString::new(secret_key.into()),
            return_url: return_url.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `YOOKASSA_SHOP_ID`
    /// - `YOOKASSA_SECRET_KEY`
    /// - `YOOKASSA_RETURN_URL` (optional, defaults to https://t.me/)
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let shop_id = std::env::var("YOOKASSA_SHOP_ID")?;
        let secret_key = std::env::var("YOOKASSA_SECRET_KEY")?;
        let return_url =
            std::env::var("YOOKASSA_RETURN_URL").unwrap_or_else(|_| "https://t.me/".to_string());

        Ok(Self::new(shop_id, secret_key, return_url))
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// YooKassa payment gateway adapter.
pub struct YooKassaGateway {
    config: YooKassaConfig,
    http_client: reqwest::Client,
}

impl YooKassaGateway {
    pub fn new(config: YooKassaConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn post(&self, path: &str, idempotency_key: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.url(path))
            .basic_auth(
                &self.config.shop_id,
                Some(self.config.secret_key.expose_secret()),
            )
            .header("Idempotence-Key", idempotency_key)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<YooKassaPayment, GatewayError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<YooKassaErrorBody> = serde_json::from_str(&body).ok();
            let description = parsed
                .as_ref()
                .and_then(|b| b.description.clone())
                .unwrap_or_else(|| body.clone());

            tracing::warn!(status = %status, error = %description, "YooKassa request failed");

            let mut err =
                GatewayError::new(status_code(status), format!("YooKassa: {}", description));
            if let Some(code) = parsed.and_then(|b| b.code) {
                err = err.with_provider_code(code);
            }
            return Err(err);
        }

        response.json().await.map_err(|e| {
            GatewayError::new(
                GatewayErrorCode::InvalidResponse,
                format!("Failed to parse YooKassa response: {}", e),
            )
        })
    }
}

/// Maps an HTTP status to an error category.
fn status_code(status: reqwest::StatusCode) -> GatewayErrorCode {
    match status.as_u16() {
        404 => GatewayErrorCode::NotFound,
        401 | 403 => GatewayErrorCode::AuthenticationError,
        429 => GatewayErrorCode::RateLimit,
        500..=599 => GatewayErrorCode::ProviderUnavailable,
        _ => GatewayErrorCode::InvalidRequest,
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::timeout(e.to_string())
    } else {
        GatewayError::network(e.to_string())
    }
}

fn into_status(payment: YooKassaPayment) -> Result<GatewayPaymentStatus, GatewayError> {
    let status = ObservedStatus::from_gateway(&payment.status).ok_or_else(|| {
        GatewayError::new(
            GatewayErrorCode::InvalidResponse,
            format!("Unknown payment status '{}'", payment.status),
        )
    })?;
    let amount = payment.amount.to_money().map_err(|e| {
        GatewayError::new(GatewayErrorCode::InvalidResponse, e.to_string())
    })?;

    let metadata = GatewayMetadata {
        user_id: payment
            .metadata
            .get(METADATA_USER_ID)
            .and_then(|v| v.parse::<UserId>().ok()),
        internal_payment_id: payment
            .metadata
            .get(METADATA_PAYMENT_ID)
            .and_then(|v| v.parse::<PaymentId>().ok()),
    };

    Ok(GatewayPaymentStatus {
        gateway_payment_id: payment.id,
        status,
        amount,
        metadata,
    })
}

#[async_trait]
impl PaymentGateway for YooKassaGateway {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_USER_ID.to_string(), request.user_id.to_string());
        metadata.insert(METADATA_PAYMENT_ID.to_string(), request.payment_id.to_string());

        let body = CreatePaymentBody {
            amount: YooKassaAmount::from_money(&request.amount),
            confirmation: ConfirmationRequest::redirect(&self.config.return_url),
            capture: true,
            description: request.description,
            metadata,
        };

        let payment = self
            .send(
                self.post("/payments", &request.payment_id.idempotency_key())
                    .json(&body),
            )
            .await?;

        tracing::info!(
            payment_id = %request.payment_id,
            gateway_payment_id = %payment.id,
            "YooKassa payment created"
        );

        Ok(GatewayPayment {
            gateway_payment_id: payment.id,
            confirmation_url: payment.confirmation.and_then(|c| c.confirmation_url),
        })
    }

    async fn get_status(
        &self,
        gateway_payment_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let request = self
            .http_client
            .get(self.url(&format!("/payments/{}", gateway_payment_id)))
            .basic_auth(
                &self.config.shop_id,
                Some(self.config.secret_key.expose_secret()),
            );
        into_status(self.send(request).await?)
    }

    async fn cancel(&self, gateway_payment_id: &str) -> Result<(), GatewayError> {
        let key = format!("cancel-{}", gateway_payment_id);
        self.send(
            self.post(&format!("/payments/{}/cancel", gateway_payment_id), &key)
                .json(&serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    async fn capture(&self, gateway_payment_id: &str) -> Result<(), GatewayError> {
        let key = format!("capture-{}", gateway_payment_id);
        self.send(
            self.post(&format!("/payments/{}/capture", gateway_payment_id), &key)
                .json(&serde_json::json!({})),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_statuses_map_to_error_codes() {
        use reqwest::StatusCode;
        assert_eq!(status_code(StatusCode::NOT_FOUND), GatewayErrorCode::NotFound);
        assert_eq!(
            status_code(StatusCode::UNAUTHORIZED),
            GatewayErrorCode::AuthenticationError
        );
        assert_eq!(
            status_code(StatusCode::TOO_MANY_REQUESTS),
            GatewayErrorCode::RateLimit
        );
        assert_eq!(
            status_code(StatusCode::BAD_GATEWAY),
            GatewayErrorCode::ProviderUnavailable
        );
        assert_eq!(
            status_code(StatusCode::BAD_REQUEST),
            GatewayErrorCode::InvalidRequest
        );
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = YooKassaConfig::new("shop", "secret", "https://t.me/")
            .with_base_url("http://localhost:8080/v3/");
        let gateway = YooKassaGateway::new(config);
        assert_eq!(gateway.url("/payments"), "http://localhost:8080/v3/payments");
    }

    #[test]
    fn payment_object_maps_to_status_with_metadata() {
        let payment_id = PaymentId::new();
        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), "42".to_string());
        metadata.insert("bot_payment_id".to_string(), payment_id.to_string());

        let status = into_status(YooKassaPayment {
            id: "gw-1".to_string(),
            status: "waiting_for_capture".to_string(),
            amount: YooKassaAmount {
                value: "500.00".to_string(),
                currency: "RUB".to_string(),
            },
            confirmation: None,
            metadata,
        })
        .unwrap();

        assert_eq!(status.status, ObservedStatus::WaitingForCapture);
        assert_eq!(status.amount.minor_units(), 50_000);
        assert_eq!(status.metadata.user_id, Some(UserId::new(42)));
        assert_eq!(status.metadata.internal_payment_id, Some(payment_id));
    }

    #[test]
    fn unknown_status_is_invalid_response() {
        let err = into_status(YooKassaPayment {
            id: "gw-1".to_string(),
            status: "teleported".to_string(),
            amount: YooKassaAmount {
                value: "1.00".to_string(),
                currency: "RUB".to_string(),
            },
            confirmation: None,
            metadata: HashMap::new(),
        })
        .unwrap_err();
        assert_eq!(err.code, GatewayErrorCode::InvalidResponse);
        assert!(!err.retryable);
    }
}
