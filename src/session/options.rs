//! Session configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether::{DecodeMode, RetryPolicy, SessionOptions};
//!
//! let options = SessionOptions::new()
//!     .with_retry(RetryPolicy::new(5, Duration::from_millis(500)))
//!     .with_decode(DecodeMode::Json)
//!     .with_max_history(20);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{DEFAULT_DISCRIMINATOR, DecodeMode};
use crate::transport::TransportOptions;

use super::history::DEFAULT_HISTORY_CAPACITY;
use super::retry::RetryPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default capacity of the session event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ============================================================================
// Heartbeat
// ============================================================================

/// Keep-alive configuration for WebSocket sessions.
///
/// While open, the session sends [`message`](Self::message) every
/// [`interval`](Self::interval). When a pong timeout is set and no frame
/// arrives in time after a ping, the connection is failed and handed to the
/// retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Ping payload.
    pub message: String,

    /// Time between pings.
    pub interval: Duration,

    /// Maximum wait for any frame after a ping. `None` disables the check.
    pub pong_timeout: Option<Duration>,

    /// Pong payload swallowed by the session. `None` means the ping payload.
    pub response: Option<String>,
}

impl Heartbeat {
    /// Default ping payload.
    pub const DEFAULT_MESSAGE: &'static str = "ping";

    /// Default ping interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Default pong timeout.
    pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(1);

    /// Creates a heartbeat with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ping payload.
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the ping interval.
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the pong timeout.
    #[inline]
    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Sets the pong payload.
    #[inline]
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Returns the payload treated as a pong.
    #[inline]
    #[must_use]
    pub fn pong(&self) -> &str {
        self.response.as_deref().unwrap_or(&self.message)
    }

    /// Validates the heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the interval or pong timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::config(
                "Heartbeat interval must be greater than zero.\n\
                 Example: Heartbeat::new().with_interval(Duration::from_secs(30))",
            ));
        }
        if self.pong_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::config(
                "Heartbeat pong timeout must be greater than zero. Use None to disable it.",
            ));
        }
        Ok(())
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            message: Self::DEFAULT_MESSAGE.to_owned(),
            interval: Self::DEFAULT_INTERVAL,
            pong_timeout: Some(Self::DEFAULT_PONG_TIMEOUT),
            response: None,
        }
    }
}

// ============================================================================
// SessionOptions
// ============================================================================

/// Behavior of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Defer connecting until `connect()` and ignore endpoint changes.
    pub manual: bool,

    /// Reconnection policy.
    pub retry: RetryPolicy,

    /// How incoming frames are decoded.
    pub decode: DecodeMode,

    /// Field naming the message type.
    pub discriminator_key: String,

    /// Number of frames kept in history. Zero disables history.
    pub max_history: usize,

    /// Keep-alive pings. Only honored by WebSocket sessions.
    pub heartbeat: Option<Heartbeat>,

    /// Capacity of the broadcast channel behind `subscribe()`.
    pub event_capacity: usize,

    /// Per-connection transport options.
    pub transport: TransportOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            manual: false,
            retry: RetryPolicy::disabled(),
            decode: DecodeMode::Disabled,
            discriminator_key: DEFAULT_DISCRIMINATOR.to_owned(),
            max_history: DEFAULT_HISTORY_CAPACITY,
            heartbeat: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            transport: TransportOptions::new(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables manual mode.
    #[inline]
    #[must_use]
    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    /// Sets the retry policy.
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: impl Into<RetryPolicy>) -> Self {
        self.retry = retry.into();
        self
    }

    /// Sets the decode mode.
    #[inline]
    #[must_use]
    pub fn with_decode(mut self, decode: impl Into<DecodeMode>) -> Self {
        self.decode = decode.into();
        self
    }

    /// Sets the discriminator key.
    #[inline]
    #[must_use]
    pub fn with_discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.discriminator_key = key.into();
        self
    }

    /// Sets the history capacity.
    #[inline]
    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Enables keep-alive pings.
    #[inline]
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Sets the event channel capacity.
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the transport options.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.discriminator_key.is_empty() {
            return Err(Error::config(
                "Discriminator key must not be empty.\n\
                 Example: .discriminator_key(\"type\")",
            ));
        }

        if self.event_capacity == 0 {
            return Err(Error::config("Event channel capacity must be greater than zero."));
        }

        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SessionOptions::new();
        assert!(!options.manual);
        assert!(!options.retry.is_enabled());
        assert!(!options.decode.is_enabled());
        assert_eq!(options.discriminator_key, "type");
        assert_eq!(options.max_history, 100);
        assert!(options.heartbeat.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let options = SessionOptions::new()
            .with_manual(true)
            .with_retry(true)
            .with_decode(true)
            .with_discriminator_key("op")
            .with_max_history(5);

        assert!(options.manual);
        assert_eq!(options.retry.max_retries(), RetryPolicy::DEFAULT_RETRIES);
        assert!(options.decode.is_enabled());
        assert_eq!(options.discriminator_key, "op");
        assert_eq!(options.max_history, 5);
    }

    #[test]
    fn test_empty_discriminator_rejected() {
        let err = SessionOptions::new()
            .with_discriminator_key("")
            .validate()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        assert!(SessionOptions::new().with_event_capacity(0).validate().is_err());
    }

    #[test]
    fn test_heartbeat_defaults() {
        let heartbeat = Heartbeat::new();
        assert_eq!(heartbeat.message, "ping");
        assert_eq!(heartbeat.pong(), "ping");
        assert_eq!(heartbeat.interval, Duration::from_secs(1));
        assert_eq!(heartbeat.pong_timeout, Some(Duration::from_secs(1)));
        assert_eq!(heartbeat.clone().with_response("pong").pong(), "pong");
    }

    #[test]
    fn test_heartbeat_validation() {
        assert!(Heartbeat::new().with_interval(Duration::ZERO).validate().is_err());
        assert!(
            Heartbeat::new()
                .with_pong_timeout(Some(Duration::ZERO))
                .validate()
                .is_err()
        );
        assert!(Heartbeat::new().with_pong_timeout(None).validate().is_ok());

        let options = SessionOptions::new().with_heartbeat(Heartbeat::new().with_interval(Duration::ZERO));
        assert!(options.validate().is_err());
    }
}
