//! Verification configuration.
//!
//! Defaults encode the production polling schedule; every knob can be
//! overridden through environment variables for a specific host.

use std::env;
use std::time::Duration;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

/// Polling schedule and stop-condition settings.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Delay before the first retry; doubles from here.
    pub initial_delay: Duration,
    /// Growth factor applied to each successive retry delay.
    pub backoff_multiplier: u32,
    /// Ceiling on a single backoff delay.
    pub max_delay: Duration,
    /// Polls issued before the session gives up with its last-seen status.
    pub max_attempts: u32,
    /// Consecutive not-found responses that fail the session outright.
    pub not_found_threshold: u32,
    /// Attempts for which a not-found is still logged as an expected miss.
    pub not_found_grace_attempts: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2,
            max_delay: Duration::from_millis(16_000),
            max_attempts: 15,
            not_found_threshold: 3,
            not_found_grace_attempts: 3,
        }
    }
}

impl VerifierConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.initial_delay = Duration::from_millis(
            env::var("VERIFY_INITIAL_DELAY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.initial_delay.as_millis() as u64),
        );
        cfg.backoff_multiplier = env::var("VERIFY_BACKOFF_MULTIPLIER")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.backoff_multiplier);
        cfg.max_delay = Duration::from_millis(
            env::var("VERIFY_MAX_DELAY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.max_delay.as_millis() as u64),
        );
        cfg.max_attempts = env::var("VERIFY_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.max_attempts);
        cfg.not_found_threshold = env::var("VERIFY_NOT_FOUND_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.not_found_threshold);
        cfg.not_found_grace_attempts = env::var("VERIFY_NOT_FOUND_GRACE_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.not_found_grace_attempts);
        cfg
    }

    /// Delay inserted before retry `retry` (1-indexed; retry 0 is the
    /// immediate first poll).
    ///
    /// | retry | delay  |
    /// |-------|--------|
    /// | 1     | 1 s    |
    /// | 2     | 2 s    |
    /// | 3     | 4 s    |
    /// | 4     | 8 s    |
    /// | ≥ 5   | 16 s   |
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        // The exponent is clamped so the multiplication cannot overflow long
        // after the delay has already hit the ceiling.
        let exponent = (retry - 1).min(16);
        let factor = self.backoff_multiplier.saturating_pow(exponent);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "VERIFY_MAX_ATTEMPTS cannot be 0".to_string(),
            ));
        }
        if self.backoff_multiplier == 0 {
            return Err(ConfigError::InvalidValue(
                "VERIFY_BACKOFF_MULTIPLIER cannot be 0".to_string(),
            ));
        }
        if self.not_found_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "VERIFY_NOT_FOUND_THRESHOLD cannot be 0".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::InvalidValue(
                "VERIFY_MAX_DELAY_MS must be >= VERIFY_INITIAL_DELAY_MS".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storefront API endpoint settings for the HTTP status probe.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Bearer token attached to status requests when set.
    pub api_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(15),
            api_token: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env::var("STOREFRONT_API_URL")
                .map_err(|_| ConfigError::MissingVariable("STOREFRONT_API_URL".to_string()))?,
            request_timeout: Duration::from_secs(
                env::var("STOREFRONT_REQUEST_TIMEOUT")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("STOREFRONT_REQUEST_TIMEOUT".to_string())
                    })?,
            ),
            api_token: env::var("STOREFRONT_API_TOKEN").ok(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue("STOREFRONT_API_URL".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_API_URL must be a valid URL".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_REQUEST_TIMEOUT cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_matches_production_values() {
        let cfg = VerifierConfig::default();
        assert_eq!(cfg.initial_delay, Duration::from_millis(1000));
        assert_eq!(cfg.backoff_multiplier, 2);
        assert_eq!(cfg.max_delay, Duration::from_millis(16_000));
        assert_eq!(cfg.max_attempts, 15);
        assert_eq!(cfg.not_found_threshold, 3);
    }

    #[test]
    fn backoff_delay_schedule_is_correct() {
        let cfg = VerifierConfig::default();
        let delays: Vec<u64> = (1..=6).map(|k| cfg.backoff_delay(k).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000, 16_000]);
    }

    #[test]
    fn first_poll_has_no_delay() {
        let cfg = VerifierConfig::default();
        assert_eq!(cfg.backoff_delay(0), Duration::ZERO);
    }

    #[test]
    fn backoff_delay_is_capped_far_beyond_the_schedule() {
        let cfg = VerifierConfig::default();
        assert_eq!(cfg.backoff_delay(99), Duration::from_millis(16_000));
    }

    #[test]
    fn zero_attempt_budget_fails_validation() {
        let cfg = VerifierConfig {
            max_attempts: 0,
            ..VerifierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_delay_bounds_fail_validation() {
        let cfg = VerifierConfig {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(1),
            ..VerifierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gateway_url_must_be_http() {
        let cfg = GatewayConfig {
            base_url: "ftp://shop.example".to_string(),
            ..GatewayConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = GatewayConfig::default();
        assert!(cfg.validate().is_ok());
    }
}
