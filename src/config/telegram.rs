//! Telegram bot configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Bot and channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token; empty runs without a bot (stub channel, recording notifier)
    #[serde(default)]
    pub bot_token: String,

    /// Private channel id (negative, e.g. -1001234567890)
    #[serde(default)]
    pub channel_id: i64,

    /// Operator chat ids (comma-separated)
    pub admin_ids: Option<String>,

    /// Invite link lifetime in hours
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_hours: i64,

    /// Deadline for every Bot API call in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl TelegramConfig {
    /// True when a bot token is configured
    pub fn has_bot(&self) -> bool {
        !self.bot_token.trim().is_empty()
    }

    /// Operator chat ids as a vector, skipping entries that do not parse
    pub fn admin_id_list(&self) -> Vec<i64> {
        self.admin_ids
            .as_ref()
            .map(|s| {
                s.split(',')
                    .filter_map(|id| id.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate telegram configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.has_bot() && self.channel_id == 0 {
            return Err(ValidationError::MissingRequired("TELEGRAM__CHANNEL_ID"));
        }
        if !(1..=24 * 7).contains(&self.invite_ttl_hours) {
            return Err(ValidationError::invalid(
                "telegram.invite_ttl_hours",
                "must be between 1 and 168",
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(ValidationError::invalid(
                "telegram.call_timeout_secs",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: 0,
            admin_ids: None,
            invite_ttl_hours: default_invite_ttl(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_invite_ttl() -> i64 {
    24
}

fn default_call_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_ids_parsing() {
        let config = TelegramConfig {
            admin_ids: Some("111, 222,oops,333".to_string()),
            ..Default::default()
        };
        assert_eq!(config.admin_id_list(), vec![111, 222, 333]);
    }

    #[test]
    fn test_no_bot_is_valid() {
        let config = TelegramConfig::default();
        assert!(!config.has_bot());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bot_requires_channel() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired("TELEGRAM__CHANNEL_ID"))
        ));
    }
}
