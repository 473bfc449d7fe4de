//! Builder pattern for session configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tether::{RetryPolicy, Session, WsTransport};
//!
//! # async fn example() -> tether::Result<()> {
//! let session = Session::builder(WsTransport::new())
//!     .endpoint("wss://example.com/feed")
//!     .auto_retry(RetryPolicy::new(5, Duration::from_secs(2)))
//!     .decode(true)
//!     .build()?;
//!
//! let _ping = session.register_handler("ping", |payload| println!("{payload}"));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::protocol::DecodeMode;
use crate::transport::{Transport, TransportOptions, WebSocketKind};

use super::core::{Session, parse_endpoint};
use super::options::{Heartbeat, SessionOptions};
use super::retry::RetryPolicy;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct SessionBuilder<T> {
    /// Transport that opens connections.
    transport: T,
    /// Endpoint, parsed in `build()`.
    endpoint: Option<String>,
    /// Session behavior.
    options: SessionOptions,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl<T: Transport> SessionBuilder<T> {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            endpoint: None,
            options: SessionOptions::default(),
        }
    }

    /// Sets the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Defers connecting until `connect()` is called.
    ///
    /// Manual sessions also ignore endpoint changes until reconnected.
    #[inline]
    #[must_use]
    pub fn manual(mut self, manual: bool) -> Self {
        self.options.manual = manual;
        self
    }

    /// Sets the retry policy. `true` enables the default policy.
    #[inline]
    #[must_use]
    pub fn auto_retry(mut self, retry: impl Into<RetryPolicy>) -> Self {
        self.options.retry = retry.into();
        self
    }

    /// Sets the decode mode. `true` enables JSON decoding.
    #[inline]
    #[must_use]
    pub fn decode(mut self, decode: impl Into<DecodeMode>) -> Self {
        self.options.decode = decode.into();
        self
    }

    /// Sets the field naming the message type.
    #[inline]
    #[must_use]
    pub fn discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.options.discriminator_key = key.into();
        self
    }

    /// Sets the history capacity. Zero disables history.
    #[inline]
    #[must_use]
    pub fn max_history(mut self, max_history: usize) -> Self {
        self.options.max_history = max_history;
        self
    }

    /// Adds a WebSocket subprotocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.options.transport.protocols.push(protocol.into());
        self
    }

    /// Adds a request header sent on every connection.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.transport.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the transport options.
    #[inline]
    #[must_use]
    pub fn transport_options(mut self, transport: TransportOptions) -> Self {
        self.options.transport = transport;
        self
    }

    /// Sets the capacity of the event channel behind `subscribe()`.
    #[inline]
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity;
        self
    }

    /// Builds the session, connecting unless manual.
    ///
    /// Must be called from within a Tokio runtime unless manual.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::Config`] if no endpoint is set and the session is not manual
    /// - [`Error::InvalidEndpoint`] if the endpoint is not a URL
    pub fn build(self) -> Result<Session<T>> {
        self.options.validate()?;
        let endpoint = self.endpoint.as_deref().map(parse_endpoint).transpose()?;
        self.validate_endpoint(endpoint.is_some())?;

        let manual = self.options.manual;
        let session = Session::new(self.transport, endpoint, self.options);
        if !manual {
            session.connect()?;
        }
        Ok(session)
    }
}

impl<T: Transport<Kind = WebSocketKind>> SessionBuilder<T> {
    /// Enables keep-alive pings.
    #[inline]
    #[must_use]
    pub fn heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.options.heartbeat = Some(heartbeat);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl<T> SessionBuilder<T> {
    /// Validates that a session that connects on build has an endpoint.
    fn validate_endpoint(&self, has_endpoint: bool) -> Result<()> {
        if self.options.manual || has_endpoint {
            return Ok(());
        }
        Err(Error::config(
            "endpoint not defined. Use .endpoint() to set it, or .manual(true) to connect later.\n\
             Example: Session::builder(transport).endpoint(\"wss://example.com/feed\")",
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
