use std::time::Duration;
use thiserror::Error;

/// Decision produced by classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The error looks transient; wait and re-attempt.
    Retry,
    /// The error is permanent; surface it to the caller immediately.
    NoRetry,
}

/// Rejected backoff configuration. Raised at construction, never at call time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidBackoff {
    #[error("initial interval must be positive")]
    ZeroInitialInterval,
    #[error("multiplier must be >= 1.0 and finite, got {0}")]
    Multiplier(f64),
    #[error("max interval {max:?} must be >= initial interval {initial:?}")]
    MaxBelowInitial { initial: Duration, max: Duration },
}

/// Deterministic exponential backoff: `min(initial * multiplier^attempt, max)`.
///
/// No jitter. `attempt` is the zero-based count of prior failed attempts, so
/// the very first retry waits exactly `initial`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl Backoff {
    pub const DEFAULT_INITIAL: Duration = Duration::from_millis(1000);
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_MAX: Duration = Duration::from_millis(30_000);

    /// Validates and builds a backoff schedule. Invalid parameter combinations
    /// fail here so the retry loop never has to re-check them.
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Result<Self, InvalidBackoff> {
        if initial.is_zero() {
            return Err(InvalidBackoff::ZeroInitialInterval);
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(InvalidBackoff::Multiplier(multiplier));
        }
        if max < initial {
            return Err(InvalidBackoff::MaxBelowInitial { initial, max });
        }
        Ok(Self {
            initial,
            multiplier,
            max,
        })
    }

    /// Wait before retry number `attempt` (zero-based). Monotonically
    /// non-decreasing in `attempt` and never above the configured max.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let raw = self.initial.as_secs_f64() * factor;
        if !raw.is_finite() || raw >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(raw)
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Self::DEFAULT_INITIAL,
            multiplier: Self::DEFAULT_MULTIPLIER,
            max: Self::DEFAULT_MAX,
        }
    }
}
