use crate::config::ReconnectConfig;
use std::time::Duration;

/// Exponential reconnect backoff.
///
/// `delay(attempt) = min(base * 2^attempt, max)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let scaled = 2u64
            .checked_pow(attempt)
            .map(|factor| base_ms.saturating_mul(factor))
            .unwrap_or(u64::MAX);

        Duration::from_millis(scaled).min(self.max_delay)
    }

    /// Whether another reconnect may be scheduled after `attempt` tries
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
        )
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}
