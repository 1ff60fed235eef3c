//! Backoff between contended protocol attempts
//!
//! Actors never wait on each other; when an attempt loses a race they simply
//! pause briefly before trying again so a crowd of writers does not burn its
//! whole try budget in a few milliseconds.

use std::thread;
use std::time::Duration;

/// Pause schedule between consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait `step * attempt`, capped at `max`.
    Linear { step: Duration, max: Duration },
    /// Wait `initial * 2^attempt`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: Duration::from_micros(50),
            max: Duration::from_millis(2),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u64) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Linear { step, max } => {
                let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
                step.saturating_mul(factor).min(max)
            }
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(20) as u32;
                initial.saturating_mul(1 << shift).min(max)
            }
        }
    }

    /// Sleep for [`Backoff::delay`].
    pub fn pause(&self, attempt: u64) {
        let delay = self.delay(attempt);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none() {
        assert_eq!(Backoff::None.delay(1000), Duration::ZERO);
    }

    #[test]
    fn test_linear() {
        let backoff = Backoff::Linear {
            step: Duration::from_millis(1),
            max: Duration::from_millis(3),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(1));
        assert_eq!(backoff.delay(2), Duration::from_millis(2));
        assert_eq!(backoff.delay(10), Duration::from_millis(3));
    }

    #[test]
    fn test_exponential() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_micros(50));
        assert_eq!(backoff.delay(2), Duration::from_micros(100));
        assert_eq!(backoff.delay(3), Duration::from_micros(200));
        assert_eq!(backoff.delay(100), Duration::from_millis(2));
        assert_eq!(backoff.delay(u64::MAX), Duration::from_millis(2));
    }
}
