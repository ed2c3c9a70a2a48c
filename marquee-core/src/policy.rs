use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hold and payment policy knobs, loaded from the `booking` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRules {
    pub hold_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub retry_window_seconds: u64,
    #[serde(default = "default_claim_retries")]
    pub claim_retries: u32,
    #[serde(default = "default_min_amount")]
    pub min_amount: i64,
    #[serde(default = "default_max_amount")]
    pub max_amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_claim_retries() -> u32 {
    3
}

fn default_min_amount() -> i64 {
    1
}

fn default_max_amount() -> i64 {
    10_000_000
}

fn default_currency() -> String {
    "INR".to_string()
}

impl BookingRules {
    pub fn hold_duration(&self) -> Duration {
        Duration::from_secs(self.hold_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn retry_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retry_window_seconds as i64)
    }

    /// Checks the relations between knobs that serde alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.hold_seconds == 0 {
            return Err("booking.hold_seconds must be positive".to_string());
        }
        if self.retry_window_seconds >= self.hold_seconds {
            return Err(format!(
                "booking.retry_window_seconds ({}) must be shorter than booking.hold_seconds ({})",
                self.retry_window_seconds, self.hold_seconds
            ));
        }
        if self.min_amount < 1 || self.min_amount > self.max_amount {
            return Err(format!(
                "booking.min_amount ({}) must be between 1 and booking.max_amount ({})",
                self.min_amount, self.max_amount
            ));
        }
        Ok(())
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_seconds: 600,
            sweep_interval_seconds: 300,
            retry_window_seconds: 300,
            claim_retries: default_claim_retries(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            currency: default_currency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(BookingRules::default().validate().is_ok());
    }

    #[test]
    fn test_retry_window_must_be_shorter_than_hold() {
        let rules = BookingRules { retry_window_seconds: 600, ..BookingRules::default() };
        let err = rules.validate().unwrap_err();
        assert!(err.contains("retry_window_seconds"));

        let rules = BookingRules { retry_window_seconds: 599, ..BookingRules::default() };
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_amount_bounds_must_be_ordered() {
        let rules = BookingRules { min_amount: 500, max_amount: 100, ..BookingRules::default() };
        assert!(rules.validate().is_err());
    }
}
