//! Timeouts and deadlines for lock operations.
//!
//! A [`Timeout`] is what callers pass in: wait forever, or wait at most some
//! duration. It is turned into an absolute [`Deadline`] when the operation
//! starts, measured on the monotonic clock.

use crate::error::{Result, SafelockError};
use std::time::{Duration, Instant};

/// How long a lock operation may keep retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Retry until the operation succeeds or fails fatally.
    #[default]
    Never,
    /// Give up after this long.
    After(Duration),
}

impl Timeout {
    /// Build a timeout from a number of seconds.
    ///
    /// Fractions are allowed; negative, NaN and infinite values are not.
    pub fn from_secs(secs: f64) -> Result<Self> {
        Duration::try_from_secs_f64(secs)
            .map(Timeout::After)
            .map_err(|_| {
                SafelockError::InvalidRequest(format!(
                    "timeout must be a non-negative number of seconds, not {}",
                    secs
                ))
            })
    }

    /// Build a timeout from optional seconds, `None` meaning wait forever.
    pub fn from_optional_secs(secs: Option<f64>) -> Result<Self> {
        secs.map_or(Ok(Timeout::Never), Self::from_secs)
    }

    /// The duration, if any.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Timeout::Never => None,
            Timeout::After(duration) => Some(*duration),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::After(duration)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Timeout::Never, Timeout::After)
    }
}

impl std::fmt::Display for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeout::Never => write!(f, "no timeout"),
            Timeout::After(duration) => write!(f, "{:.3}s timeout", duration.as_secs_f64()),
        }
    }
}

/// Absolute point in time after which an operation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Start the clock for `timeout` now.
    pub fn start(timeout: Timeout) -> Self {
        Self::starting_at(Instant::now(), timeout)
    }

    /// Start the clock for `timeout` at `now`.
    ///
    /// A timeout too large to represent is treated as no deadline.
    pub fn starting_at(now: Instant, timeout: Timeout) -> Self {
        let at = timeout.duration().and_then(|d| now.checked_add(d));
        Self { at }
    }

    /// A deadline that never passes.
    pub fn never() -> Self {
        Self { at: None }
    }

    /// Whether a deadline was set at all.
    pub fn is_set(&self) -> bool {
        self.at.is_some()
    }

    pub fn has_passed(&self) -> bool {
        self.has_passed_at(Instant::now())
    }

    pub fn has_passed_at(&self, now: Instant) -> bool {
        self.at.is_some_and(|at| now >= at)
    }

    /// Time left, or `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(now))
    }

    /// How long to sleep before the next attempt: `interval`, cut short so
    /// the sleep never runs past the deadline.
    pub fn next_pause(&self, interval: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => interval.min(remaining),
            None => interval,
        }
    }
}
