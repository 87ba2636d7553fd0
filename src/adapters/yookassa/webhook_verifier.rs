//! Notification signature verification.
//!
//! The HTTP layer hands the raw body and the hex signature header to
//! `WebhookVerifier::verify` before parsing anything.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Errors from signature verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing signature")]
    Missing,

    #[error("Invalid signature format (not valid hex)")]
    InvalidFormat,

    #[error("Invalid signature")]
    Mismatch,
}

/// HMAC-SHA256 verifier keyed with the configured webhook secret.
pub struct WebhookVerifier {
    secret: SecretString,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Checks `signature_hex` against the HMAC of `body`.
    ///
    /// Comparison is constant-time.
    pub fn verify(&self, body: &[u8], signature_hex: &str) -> Result<(), SignatureError> {
        let signature_hex = signature_hex.trim();
        if signature_hex.is_empty() {
            return Err(SignatureError::Missing);
        }
        let provided = hex_decode(signature_hex).ok_or(SignatureError::InvalidFormat)?;

        let expected = self.sign(body);
        if expected.as_slice().ct_eq(provided.as_slice()).unwrap_u8() != 1 {
            tracing::warn!("Invalid notification signature");
            return Err(SignatureError::Mismatch);
        }
        Ok(())
    }

    /// Hex HMAC of `body`, as the provider would send it.
    pub fn signature_for(&self, body: &[u8]) -> String {
        hex_encode(&self.sign(body))
    }

    fn sign(&self, body: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so this never fails.
        let mut mac = match HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Decode a hex string to bytes.
fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return None;
    }

    bytes
        .chunks(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16)?;
            let low = (pair[1] as char).to_digit(16)?;
            Some((high * 16 + low) as u8)
        })
        .collect()
}

/// Encode bytes to hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
