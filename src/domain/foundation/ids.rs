//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// External identity of a subscriber (the Telegram numeric user id).
///
/// Immutable for the lifetime of the user record and used as the
/// primary key of the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Creates a UserId from the provider's numeric identity.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric identity.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        trimmed
            .parse::<i64>()
            .map(Self)
            .map_err(|e| ValidationError::invalid_format("user_id", e.to_string()))
    }
}

/// Internally generated payment identifier.
///
/// Doubles as the idempotency key for every gateway call made on
/// behalf of the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the key sent to the gateway so retries never create a second charge.
    pub fn idempotency_key(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ValidationError::invalid_format("payment_id", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_numeric_strings() {
        let id: UserId = "123456789".parse().unwrap();
        assert_eq!(id.as_i64(), 123456789);
    }

    #[test]
    fn user_id_tolerates_surrounding_whitespace() {
        let id: UserId = " 42 ".parse().unwrap();
        assert_eq!(id, UserId::new(42));
    }

    #[test]
    fn user_id_rejects_empty_and_non_numeric() {
        assert!(matches!(
            "".parse::<UserId>(),
            Err(ValidationError::EmptyField { .. })
        ));
        assert!(matches!(
            "abc".parse::<UserId>(),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn user_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&UserId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn payment_ids_are_unique() {
        assert_ne!(PaymentId::new(), PaymentId::new());
    }

    #[test]
    fn payment_id_idempotency_key_matches_display() {
        let id = PaymentId::new();
        assert_eq!(id.idempotency_key(), id.to_string());
    }

    #[test]
    fn payment_id_parses_from_display_output() {
        let id = PaymentId::new();
        let parsed: PaymentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn payment_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<PaymentId>().is_err());
    }
}
