//! Reconnection Policy
//!
//! Fixed-interval retry for the ticker feed. Every close is followed by the
//! same delay; there is no backoff growth and no jitter. An optional cap on
//! consecutive attempts ends the retry loop.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before every reconnection attempt.
    pub interval: Duration,
    /// Maximum consecutive attempts without a successful open (`None` = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Fixed-delay reconnection policy.
///
/// # Example
///
/// ```rust
/// use ticker_stream::infrastructure::coinbase::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
///
/// // Connection opened
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, counting that attempt.
    ///
    /// Returns `None` once the attempt cap has been reached.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;
        Some(self.config.interval)
    }

    /// Reset after a successful open.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Attempts made since the last successful open.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        match self.config.max_attempts {
            None => true,
            Some(max) => self.attempt_count < max,
        }
    }

    /// The configured cap, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.config.max_attempts
    }
}

/// Error type for reconnection failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectError {
    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxAttemptsExceeded(u32),
}
