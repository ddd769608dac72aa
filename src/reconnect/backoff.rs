use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a delay scales with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Growth {
    /// `min(base, max)` regardless of attempt.
    Fixed,
    /// `min(base * attempt, max)`.
    LinearInAttempt,
}

/// Pure mapping from attempt count to retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub growth: Growth,
}

impl BackoffPolicy {
    pub fn fixed(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            growth: Growth::Fixed,
        }
    }

    pub fn linear(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            growth: Growth::LinearInAttempt,
        }
    }

    /// Delay before the retry that follows a failure at `attempt_count`.
    pub fn delay(&self, attempt_count: u32) -> Duration {
        let raw = match self.growth {
            Growth::Fixed => self.base_delay,
            Growth::LinearInAttempt => self.base_delay.saturating_mul(attempt_count),
        };
        raw.min(self.max_delay)
    }
}

/// Retry rules for one logical connection.
///
/// Disconnects use a flat capped delay while transport errors grow linearly
/// with the attempt number up to a higher cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub auto_reconnect: bool,
    pub max_attempts: u32,
    pub on_disconnect: BackoffPolicy,
    pub on_error: BackoffPolicy,
}

impl RetryPolicy {
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(8_000);
    pub const DEFAULT_DISCONNECT_CAP: Duration = Duration::from_millis(15_000);
    pub const DEFAULT_ERROR_CAP: Duration = Duration::from_millis(30_000);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Policy with the standard caps around a configured base delay.
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            auto_reconnect: true,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            on_disconnect: BackoffPolicy::fixed(base_delay, Self::DEFAULT_DISCONNECT_CAP),
            on_error: BackoffPolicy::linear(base_delay, Self::DEFAULT_ERROR_CAP),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_base_delay(Self::DEFAULT_BASE_DELAY)
    }
}
