//! Bounded retry policy.
//!
//! The policy is a value object; [`RetryPolicy::decide`] is a pure function
//! of the current retry count. Scheduling the reconnect timer and invoking
//! the exhaustion callback are the session's job.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether::RetryPolicy;
//!
//! let policy = RetryPolicy::new(2, Duration::from_millis(10))
//!     .on_exhausted(|| eprintln!("giving up"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tracing::error;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked once when retries are exhausted.
pub type ExhaustedFn = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// RetryDecision
// ============================================================================

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt.
    Retry,
    /// The retry budget is spent.
    Exhausted,
    /// Automatic retry is off.
    Disabled,
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded retry-with-delay policy.
#[derive(Clone)]
pub struct RetryPolicy {
    enabled: bool,
    max_retries: u32,
    delay: Duration,
    on_exhausted: Option<ExhaustedFn>,
}

impl RetryPolicy {
    /// Retry budget of [`RetryPolicy::enabled`].
    pub const DEFAULT_RETRIES: u32 = 3;

    /// Delay of [`RetryPolicy::enabled`].
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Creates a disabled policy.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            delay: Duration::ZERO,
            on_exhausted: None,
        }
    }

    /// Creates an enabled policy with the given budget and delay.
    #[inline]
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            enabled: true,
            max_retries,
            delay,
            on_exhausted: None,
        }
    }

    /// Creates an enabled policy with default budget and delay.
    #[inline]
    #[must_use]
    pub const fn enabled() -> Self {
        Self::new(Self::DEFAULT_RETRIES, Self::DEFAULT_DELAY)
    }

    /// Sets the exhaustion callback.
    #[must_use]
    pub fn on_exhausted<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_exhausted = Some(Arc::new(callback));
        self
    }

    /// Returns `true` if automatic retry is on.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the retry budget.
    #[inline]
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the delay before each attempt.
    #[inline]
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides what to do after a failure, given consecutive attempts so far.
    #[must_use]
    pub const fn decide(&self, retry_count: u32) -> RetryDecision {
        if !self.enabled {
            RetryDecision::Disabled
        } else if retry_count < self.max_retries {
            RetryDecision::Retry
        } else {
            RetryDecision::Exhausted
        }
    }

    /// Invokes the exhaustion callback, if any.
    pub(crate) fn notify_exhausted(&self) {
        if let Some(callback) = &self.on_exhausted
            && catch_unwind(AssertUnwindSafe(|| callback())).is_err()
        {
            error!("Retry exhaustion callback panicked");
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl From<bool> for RetryPolicy {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::enabled()
        } else {
            Self::disabled()
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("enabled", &self.enabled)
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .field("on_exhausted", &self.on_exhausted.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
