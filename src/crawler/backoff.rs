//! Exponential backoff between fetch attempts

use std::time::Duration;

/// Exponential backoff policy
///
/// The wait after failed attempt `n` (1-based) is
/// `multiplier * 2^(n-1)`, clamped to `[min, max]`. Waits never decrease
/// from one attempt to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    multiplier: Duration,
    min: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(multiplier: Duration, min: Duration, max: Duration) -> Self {
        // Keep the clamp well-formed even if min > max slipped through
        let max = max.max(min);
        Self {
            multiplier,
            min,
            max,
        }
    }

    /// A backoff that never waits
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Returns the wait after the given failed attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1u32 << exponent);
        raw.clamp(self.min, self.max)
    }
}

impl Default for Backoff {
    /// Multiplier 1s, minimum 4s, maximum 10s
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(4),
            Duration::from_secs(10),
        )
    }
}
