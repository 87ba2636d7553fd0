//! Background job configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Expiry sweeper, reminder scheduler and statistics report settings
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Minutes between expiry sweeps
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,

    /// Users processed in parallel during a sweep
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Hours between reminder runs; also the width of each reminder window
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_hours: u64,

    /// Days before expiry on which reminders go out (comma-separated)
    #[serde(default = "default_reminder_days")]
    pub reminder_days: String,

    /// Hours between operator statistics reports; 0 turns them off
    #[serde(default = "default_stats_interval")]
    pub stats_interval_hours: u64,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_hours * 3600)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_hours > 0)
            .then(|| Duration::from_secs(self.stats_interval_hours * 3600))
    }

    /// Reminder offsets as a sorted, deduplicated vector
    pub fn reminder_day_list(&self) -> Vec<i64> {
        let mut days: Vec<i64> = self
            .reminder_days
            .split(',')
            .filter_map(|d| d.trim().parse::<i64>().ok())
            .filter(|d| *d > 0)
            .collect();
        days.sort_unstable();
        days.dedup();
        days
    }

    /// Validate sweeper configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_minutes == 0 {
            return Err(ValidationError::invalid(
                "sweeper.interval_minutes",
                "must be positive",
            ));
        }
        if self.concurrency == 0 || self.concurrency > 64 {
            return Err(ValidationError::invalid(
                "sweeper.concurrency",
                "must be between 1 and 64",
            ));
        }
        if self.reminder_interval_hours == 0 {
            return Err(ValidationError::invalid(
                "sweeper.reminder_interval_hours",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval(),
            concurrency: default_concurrency(),
            reminder_interval_hours: default_reminder_interval(),
            reminder_days: default_reminder_days(),
            stats_interval_hours: default_stats_interval(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

fn default_reminder_interval() -> u64 {
    24
}

fn default_reminder_days() -> String {
    "1,3,7".to_string()
}

fn default_stats_interval() -> u64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweeper_defaults() {
        let config = SweeperConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(3600));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.reminder_day_list(), vec![1, 3, 7]);
    }

    #[test]
    fn test_reminder_days_are_cleaned() {
        let config = SweeperConfig {
            reminder_days: "7, 1,3,3,-2,x".to_string(),
            ..Default::default()
        };
        assert_eq!(config.reminder_day_list(), vec![1, 3, 7]);
    }

    #[test]
    fn test_stats_report_can_be_disabled() {
        assert_eq!(
            SweeperConfig::default().stats_interval(),
            Some(Duration::from_secs(24 * 3600))
        );
        let off = SweeperConfig {
            stats_interval_hours: 0,
            ..Default::default()
        };
        assert_eq!(off.stats_interval(), None);
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let config = SweeperConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
