// # Waiters
//
// Blocking delay strategies used by the retry policy.
//
// Sleeping goes through the `Sleeper` trait so the policy never touches the
// clock directly: production code uses `TokioSleeper`, tests plug in a
// recorder and assert on the requested delays.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Something that can block the current task for a while
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Exponential backoff schedule
///
/// The n-th delay (0-based) is `initial * factor^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// First delay
    pub initial: Duration,
    /// Multiplier applied per attempt (values below 1 are treated as 1)
    pub factor: f64,
    /// Upper bound for any delay
    pub max: Duration,
}

impl Backoff {
    /// Create a backoff schedule
    pub fn new(initial: Duration, factor: f64, max: Duration) -> Self {
        Self {
            initial,
            factor,
            max,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.factor.max(1.0).powi(exponent);

        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(32))
    }
}

/// Stateful walker over a [`Backoff`] schedule
///
/// Each call to [`wait()`](Self::wait) sleeps for the next delay of the
/// schedule. One waiter is shared by every failure class that backs off
/// within a single retried operation.
#[derive(Debug, Clone)]
pub struct BackoffWaiter {
    backoff: Backoff,
    attempt: u32,
}

impl BackoffWaiter {
    /// Start at the beginning of `backoff`
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            attempt: 0,
        }
    }

    /// Advance the schedule and return the delay without sleeping
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.backoff.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Sleep for the next delay of the schedule and return it
    pub async fn wait(&mut self, sleeper: &dyn Sleeper) -> Duration {
        let delay = self.next_delay();
        sleeper.sleep(delay).await;
        delay
    }

    /// Go back to the first delay
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
