//! Timing and sizing knobs for the coordinator and the SAGA consumer.

use std::time::Duration;

use store::LockSettings;

/// Settings for [`PaymentCoordinator`](crate::PaymentCoordinator).
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub lock: LockSettings,
    /// How long a callback's idempotency key suppresses replays.
    pub idempotency_ttl: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock: LockSettings::default(),
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overridden by `LOCK_WAIT_MS`, `LOCK_LEASE_MS` and
    /// `IDEMPOTENCY_TTL_SECS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("LOCK_WAIT_MS") {
            config.lock.wait = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("LOCK_LEASE_MS") {
            config.lock.lease = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("IDEMPOTENCY_TTL_SECS") {
            config.idempotency_ttl = Duration::from_secs(secs);
        }
        config
    }
}

/// Settings for [`SagaConsumer`](crate::SagaConsumer).
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group whose offsets are committed.
    pub group: String,
    /// Records fetched per poll.
    pub batch_size: usize,
    /// Pause after a poll that returned nothing.
    pub poll_interval: Duration,
    /// First delay after a failed record; doubles on each further failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "payment-service".to_string(),
            batch_size: 10,
            poll_interval: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ConsumerConfig {
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Delay to wait after `failures` consecutive failures (starting at 1).
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.lock.wait, Duration::from_secs(5));
        assert_eq!(config.lock.lease, Duration::from_secs(30));
        assert_eq!(config.idempotency_ttl, Duration::from_secs(86_400));

        let consumer = ConsumerConfig::default();
        assert_eq!(consumer.group, "payment-service");
        assert_eq!(consumer.batch_size, 10);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = ConsumerConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
        assert_eq!(config.backoff(20), Duration::from_secs(30));
        assert_eq!(config.backoff(100), Duration::from_secs(30));
    }
}
