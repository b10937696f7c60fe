//! Configuration types for zonesync
//!
//! Configuration is an explicit value built once at startup and passed to
//! the components that need it. Nothing in the core reads environment
//! variables or other process-wide state.

use crate::retry::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Refuse to apply a changeset removing more records than this
    #[serde(default = "default_max_removals")]
    pub max_removals: usize,

    /// Retry budgets and backoff for provider calls
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            max_removals: default_max_removals(),
            retry: RetryConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.retry.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry configuration
///
/// Each transient failure class has its own budget; see
/// [`RetryPolicy`](crate::retry::RetryPolicy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed after timeouts
    #[serde(default = "default_budget")]
    pub max_timeouts: u32,

    /// Retries allowed after connection resets
    #[serde(default = "default_budget")]
    pub max_connection_resets: u32,

    /// Retries allowed after unparseable response bodies
    #[serde(default = "default_budget")]
    pub max_unparseable_responses: u32,

    /// Retries allowed after rate-limit responses
    #[serde(default = "default_budget")]
    pub max_rate_limits: u32,

    /// First backoff delay (in milliseconds)
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Backoff cap (in milliseconds)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    /// Backoff schedule described by this configuration
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_initial_ms),
            self.backoff_factor,
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Validate the retry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(crate::Error::config("Backoff factor must be >= 1"));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(crate::Error::config(
                "Backoff maximum must not be lower than the initial delay",
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_timeouts: default_budget(),
            max_connection_resets: default_budget(),
            max_unparseable_responses: default_budget(),
            max_rate_limits: default_budget(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_factor: default_backoff_factor(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_max_removals() -> usize {
    20
}

fn default_budget() -> u32 {
    5
}

fn default_backoff_initial_ms() -> u64 {
    1_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_backoff_max_ms() -> u64 {
    32_000
}
