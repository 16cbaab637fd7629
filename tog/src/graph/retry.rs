//! Retry policy for external calls.
//!
//! Model calls go through [`complete_with_retry`](crate::llm::complete_with_retry),
//! which consults this policy between attempts.

use std::time::Duration;

/// How many times, and how long to wait, before retrying a failed call.
///
/// `max_attempts` counts retries, not the first attempt: `exponential(2, ..)`
/// allows up to three calls in total.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RetryPolicy {
    /// Fail immediately.
    #[default]
    None,
    /// Constant delay between retries.
    Fixed {
        max_attempts: usize,
        interval: Duration,
    },
    /// Delay grows by `multiplier` each retry, capped at `max_interval`.
    Exponential {
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy::None
    }

    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            interval,
        }
    }

    pub fn exponential(
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    ) -> Self {
        RetryPolicy::Exponential {
            max_attempts,
            initial_interval,
            max_interval,
            multiplier,
        }
    }

    /// True when retry number `attempt` (0-based) is still allowed.
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts()
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { interval, .. } => *interval,
            RetryPolicy::Exponential {
                initial_interval,
                max_interval,
                multiplier,
                ..
            } => {
                let secs = initial_interval.as_secs_f64() * multiplier.powi(attempt as i32);
                if !secs.is_finite() {
                    return *max_interval;
                }
                Duration::from_secs_f64(secs.max(0.0)).min(*max_interval)
            }
        }
    }

    pub fn max_attempts(&self) -> usize {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}
