//! Retry policy for access-token refresh.

use std::time::Duration;

/// Configuration for token refresh retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Maximum number of attempts, including the first.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Refresh when the access token expires within this many seconds.
    pub expiry_margin_secs: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            expiry_margin_secs: 60,
        }
    }
}

impl RefreshConfig {
    /// No waiting between attempts. For tests.
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    pub fn expiry_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiry_margin_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RefreshConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn test_delay_doubles_until_capped() {
        let config = RefreshConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(70), Duration::from_millis(5000));
    }

    #[test]
    fn test_immediate_never_waits() {
        let config = RefreshConfig::immediate();
        assert_eq!(config.delay_for_attempt(2), Duration::ZERO);
        assert_eq!(config.max_retries, 3);
    }
}
