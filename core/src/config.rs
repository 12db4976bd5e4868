//! Runtime configuration for the client core.
//!
//! Values are supplied by the host application, not hardcoded: the
//! confirmation window and the reconnect backoff ceiling are product
//! choices, and they live here next to the polling interval used while
//! the push channel is degraded.

use std::time::Duration;

/// Bounded exponential backoff for push-channel reconnects.
///
/// # Default Values
///
/// - `initial_delay`: 500ms
/// - `max_delay`: 30 seconds (the ceiling)
/// - `multiplier`: 2.0
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Ceiling for the exponential backoff.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Calculate the delay for a given consecutive-failure count.
    ///
    /// Uses exponential backoff: `initial_delay * multiplier ^ attempt`,
    /// capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }
}

/// Configuration for the order-lifecycle core.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum elapsed time after dispatch before a customer-initiated
    /// delivery confirmation is accepted.
    ///
    /// Default: 7 days. The production value is an external choice; tests
    /// use seconds.
    pub confirmation_window: chrono::Duration,

    /// Reconnect backoff for the push channel.
    pub reconnect: BackoffPolicy,

    /// Consecutive connect failures before the subscriber reports itself
    /// degraded and the synchronizer falls back to polling.
    ///
    /// Default: 5
    pub degraded_after: u32,

    /// Reconciliation poll interval while the push channel is degraded.
    ///
    /// Default: 60 seconds
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            confirmation_window: chrono::Duration::days(7),
            reconnect: BackoffPolicy::default(),
            degraded_after: 5,
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl SyncConfig {
    /// Set the confirmation window.
    #[must_use]
    pub const fn with_confirmation_window(mut self, window: chrono::Duration) -> Self {
        self.confirmation_window = window;
        self
    }

    /// Set the reconnect backoff policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: BackoffPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the degraded threshold.
    #[must_use]
    pub const fn with_degraded_after(mut self, failures: u32) -> Self {
        self.degraded_after = failures;
        self
    }

    /// Set the degraded-mode poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_calculation() {
        let policy = BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_respects_ceiling() {
        let policy = BackoffPolicy {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(2),
            multiplier: 10.0,
        };

        // 1000ms * 10^5 would be far past the ceiling.
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
    }

    #[test]
    fn config_builders() {
        let config = SyncConfig::default()
            .with_confirmation_window(chrono::Duration::hours(1))
            .with_degraded_after(3)
            .with_poll_interval(Duration::from_secs(5));

        assert_eq!(config.confirmation_window, chrono::Duration::hours(1));
        assert_eq!(config.degraded_after, 3);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
