//! Requeue configuration
//!
//! Two durations govern when a resource is looked at again: a short error
//! interval and a longer steady-state interval. Both arrive as whole seconds
//! from the environment, are read once at startup, and travel explicitly to
//! the drivers. A zero duration disables the requeue.

use std::time::Duration;

/// Environment variable naming the error-retry interval in whole seconds.
pub const REQUEUE_ERROR_SECS_VAR: &str = "GROVE_REQUEUE_ERROR_SECS";

/// Environment variable naming the steady-state re-sync interval.
pub const REQUEUE_STEADY_SECS_VAR: &str = "GROVE_REQUEUE_STEADY_SECS";

/// Requeue intervals for reconcile outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueConfig {
    /// Delay before retrying a failed pass.
    pub on_error: Duration,

    /// Delay before the next steady-state re-sync of a Ready resource.
    pub steady: Duration,
}

impl RequeueConfig {
    pub fn new(on_error: Duration, steady: Duration) -> Self {
        Self { on_error, steady }
    }

    /// Read both intervals from the environment. Unset variables keep their
    /// defaults; set-but-unusable values disable that requeue.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            on_error: env_secs(REQUEUE_ERROR_SECS_VAR, defaults.on_error),
            steady: env_secs(REQUEUE_STEADY_SECS_VAR, defaults.steady),
        }
    }

    /// Error-path requeue; `None` when disabled.
    pub fn error_requeue(&self) -> Option<Duration> {
        non_zero(self.on_error)
    }

    /// Steady-state requeue; `None` when disabled.
    pub fn steady_requeue(&self) -> Option<Duration> {
        non_zero(self.steady)
    }
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            on_error: Duration::from_secs(30),
            steady: Duration::from_secs(300),
        }
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

fn env_secs(var: &str, unset: Duration) -> Duration {
    match std::env::var(var) {
        Ok(raw) => parse_secs(&raw),
        Err(_) => unset,
    }
}

/// Whole seconds. Unparseable or non-positive input yields zero, disabling
/// the requeue rather than failing startup.
fn parse_secs(raw: &str) -> Duration {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or(Duration::ZERO)
}
