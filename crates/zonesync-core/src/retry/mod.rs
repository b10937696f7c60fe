//! Bounded retry for transient provider failures
//!
//! Providers only *classify* failures (see [`Error::transient_kind()`]);
//! deciding whether and when to try again is owned by the core. Every remote
//! call the core makes on a provider goes through [`RetryPolicy::run()`].
//!
//! ## Budgets
//!
//! Each failure class has its own budget, counted per operation:
//!
//! | Class | Default budget | Delay before retrying |
//! |---|---|---|
//! | Timeout | 5 | none |
//! | Connection reset | 5 | exponential backoff |
//! | Unparseable response | 5 | exponential backoff |
//! | Rate limited | 5 | `time_until_reset / (remaining + 1)` |
//!
//! Exhausting any budget re-raises the error that exhausted it. Errors
//! that are not transient are returned immediately.

pub mod waiter;

pub use waiter::{Backoff, BackoffWaiter, Sleeper, TokioSleeper};

use crate::config::RetryConfig;
use crate::error::{Error, Result, TransientKind};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Request quota reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests left in the current window
    pub remaining: u64,
    /// Time until the window resets
    pub reset_in: Duration,
}

impl RateLimit {
    /// Create a rate limit from remaining quota and time until reset
    pub fn new(remaining: u64, reset_in: Duration) -> Self {
        Self {
            remaining,
            reset_in,
        }
    }

    /// Create a rate limit from a reset time given as Unix epoch seconds
    ///
    /// A reset time in the past yields a zero wait.
    pub fn from_reset_epoch(remaining: u64, reset_epoch: i64, now: DateTime<Utc>) -> Self {
        let secs = reset_epoch.saturating_sub(now.timestamp()).max(0);
        Self::new(remaining, Duration::from_secs(secs.unsigned_abs()))
    }

    /// Parse the usual rate-limit response headers
    ///
    /// `x-ratelimit-remaining` + `x-ratelimit-reset` (epoch seconds) win;
    /// otherwise a `Retry-After` value in seconds is read as an exhausted
    /// quota resetting after that delay.
    pub fn from_headers(
        remaining: Option<&str>,
        reset: Option<&str>,
        retry_after: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let remaining = remaining.and_then(|v| v.trim().parse::<u64>().ok());
        let reset = reset.and_then(|v| v.trim().parse::<i64>().ok());

        if let (Some(remaining), Some(reset)) = (remaining, reset) {
            return Some(Self::from_reset_epoch(remaining, reset, now));
        }

        retry_after
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Self::new(0, Duration::from_secs(secs)))
    }

    /// How long to wait before the next request
    ///
    /// Spreads the remaining quota evenly over the reset window.
    pub fn wait_time(&self) -> Duration {
        let slots = u32::try_from(self.remaining.saturating_add(1)).unwrap_or(u32::MAX);
        self.reset_in / slots
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests remaining, resets in {}s",
            self.remaining,
            self.reset_in.as_secs()
        )
    }
}

#[derive(Debug, Default)]
struct Attempts {
    timeouts: u32,
    connection_resets: u32,
    unparseable_responses: u32,
    rate_limits: u32,
}

impl Attempts {
    fn bump(&mut self, kind: TransientKind) -> u32 {
        let counter = match kind {
            TransientKind::Timeout => &mut self.timeouts,
            TransientKind::ConnectionReset => &mut self.connection_resets,
            TransientKind::UnparseableResponse => &mut self.unparseable_responses,
            TransientKind::RateLimited => &mut self.rate_limits,
        };
        *counter += 1;
        *counter
    }
}

/// Retry policy with independent budgets per failure class
///
/// Cheap to clone; the sleeper is shared.
#[derive(Clone)]
pub struct RetryPolicy {
    max_timeouts: u32,
    max_connection_resets: u32,
    max_unparseable_responses: u32,
    max_rate_limits: u32,
    backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_timeouts", &self.max_timeouts)
            .field("max_connection_resets", &self.max_connection_resets)
            .field("max_unparseable_responses", &self.max_unparseable_responses)
            .field("max_rate_limits", &self.max_rate_limits)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl RetryPolicy {
    /// Build a policy from configuration, sleeping on the tokio timer
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_timeouts: config.max_timeouts,
            max_connection_resets: config.max_connection_resets,
            max_unparseable_responses: config.max_unparseable_responses,
            max_rate_limits: config.max_rate_limits,
            backoff: config.backoff(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(&RetryConfig {
            max_timeouts: 0,
            max_connection_resets: 0,
            max_unparseable_responses: 0,
            max_rate_limits: 0,
            ..RetryConfig::default()
        })
    }

    /// Replace the sleeper (tests use a recording sleeper)
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Backoff schedule used for resets and unparseable responses
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    fn budget(&self, kind: TransientKind) -> u32 {
        match kind {
            TransientKind::Timeout => self.max_timeouts,
            TransientKind::ConnectionReset => self.max_connection_resets,
            TransientKind::UnparseableResponse => self.max_unparseable_responses,
            TransientKind::RateLimited => self.max_rate_limits,
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or exhausts a budget
    ///
    /// # Parameters
    ///
    /// - `description`: What is being attempted (for logging)
    /// - `operation`: Produces a fresh attempt each time it is called
    pub async fn run<T, F, Fut>(&self, description: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = Attempts::default();
        let mut waiter = BackoffWaiter::new(self.backoff);

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Some(kind) = error.transient_kind() else {
                return Err(error);
            };

            let count = attempts.bump(kind);
            let budget = self.budget(kind);
            if count > budget {
                warn!(
                    "{} failed after {} {:?} retries, giving up: {}",
                    description, budget, kind, error
                );
                return Err(error);
            }

            let delay = match &error {
                Error::RateLimited { limit, .. } => {
                    let delay = limit.wait_time();
                    self.sleeper.sleep(delay).await;
                    delay
                }
                _ if kind == TransientKind::Timeout => Duration::ZERO,
                _ => waiter.wait(self.sleeper.as_ref()).await,
            };

            warn!(
                "{} failed (attempt {}/{} for {:?}), retried after {:.1}s: {}",
                description,
                count,
                budget,
                kind,
                delay.as_secs_f32(),
                error
            );
            debug!("Retrying {}", description);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
