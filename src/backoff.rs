// file: src/backoff.rs
// description: Bounded exponential reconnect policy

use std::time::Duration;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    /// Ceiling applied to every computed delay.
    pub max_delay: Duration,
    /// Fraction of the delay used as a +/- random spread. 0 disables jitter.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: 0.0,
        }
    }
}

impl ReconnectPolicy {
    /// Whether another automatic attempt may be scheduled after `attempt`
    /// retries have already been made.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// `base_delay * 2^(attempt - 1)`, clamped to `max_delay`. Attempt 0 is
    /// treated as attempt 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter > 0.0 {
            apply_jitter(delay, self.jitter).min(self.max_delay)
        } else {
            delay
        }
    }
}

fn apply_jitter(delay: Duration, ratio: f64) -> Duration {
    let ratio = ratio.clamp(0.0, 1.0);
    let spread = (fastrand::f64() * 2.0 - 1.0) * ratio;
    delay.mul_f64((1.0 + spread).max(0.0))
}
