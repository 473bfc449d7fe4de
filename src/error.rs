//! Error types for tether sessions.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tether::{Result, Session, WsTransport};
//!
//! fn example(session: &Session<WsTransport>) -> Result<()> {
//!     session.connect_to("wss://example.com/feed")?;
//!     session.send_text("hello")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Lifecycle | [`Error::Destroyed`], [`Error::NotConnected`] |
//! | Transport | [`Error::Transport`], [`Error::WebSocket`], [`Error::Http`] |
//! | Decoding | [`Error::Decode`], [`Error::Json`] |
//!
//! Only configuration and lifecycle errors interrupt the caller. Transport
//! and decode failures are recovered inside the session and surfaced through
//! [`Session::last_error`](crate::Session::last_error) and the event channel.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session options are invalid or when no endpoint is
    /// known at connect time.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint could not be parsed as a URL.
    #[error("Invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        /// The rejected endpoint string.
        endpoint: String,
        /// Underlying parse failure.
        #[source]
        source: url::ParseError,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The session was destroyed.
    ///
    /// Destruction is final; build a new session instead.
    #[error("Session destroyed")]
    Destroyed,

    /// No open connection to send on.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connection-level failure reported by a transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the event-stream client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// Incoming frame could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(endpoint: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidEndpoint { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Transport(_) | Self::WebSocket(_) | Self::Http(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on reconnect.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotConnected | Self::WebSocket(_) | Self::Http(_) => true,
            Self::Transport(err) => err.kind() != TransportErrorKind::Protocol,
            _ => false,
        }
    }
}

// ============================================================================
// TransportError
// ============================================================================

/// Category of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The established connection failed or ended abnormally.
    Stream,
    /// The peer violated the wire protocol.
    Protocol,
    /// No pong arrived within the heartbeat timeout.
    Heartbeat,
    /// An outgoing frame could not be written.
    Send,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Stream => "stream",
            Self::Protocol => "protocol",
            Self::Heartbeat => "heartbeat",
            Self::Send => "send",
        };
        f.write_str(name)
    }
}

/// Connection-level error observed on a link.
///
/// Cheap to clone so it can be stored as the session's last error and
/// broadcast to every subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport {kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Creates a transport error of the given kind.
    #[inline]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a connect error.
    #[inline]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Creates a stream error.
    #[inline]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Stream, message)
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    /// Creates a heartbeat timeout error.
    #[inline]
    pub fn heartbeat(timeout_ms: u64) -> Self {
        Self::new(
            TransportErrorKind::Heartbeat,
            format!("no pong within {timeout_ms}ms"),
        )
    }

    /// Creates a send error.
    #[inline]
    pub fn send(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Send, message)
    }

    /// Returns the error category.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = Error::config("endpoint not defined");
        assert_eq!(err.to_string(), "Configuration error: endpoint not defined");
        assert!(err.is_config_error());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_invalid_endpoint() {
        let source = url::Url::parse("not a url").unwrap_err();
        let err = Error::invalid_endpoint("not a url", source);
        assert!(err.is_config_error());
        assert!(err.to_string().starts_with("Invalid endpoint 'not a url'"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::connect("connection refused");
        assert_eq!(err.to_string(), "Transport connect error: connection refused");
        assert_eq!(err.kind(), TransportErrorKind::Connect);
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn test_heartbeat_message() {
        let err = TransportError::heartbeat(1500);
        assert_eq!(err.kind(), TransportErrorKind::Heartbeat);
        assert_eq!(err.message(), "no pong within 1500ms");
    }

    #[test]
    fn test_is_connection_error() {
        let transport: Error = TransportError::stream("reset").into();
        assert!(transport.is_connection_error());
        assert!(Error::NotConnected.is_connection_error());
        assert!(!Error::Destroyed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        let stream: Error = TransportError::stream("reset").into();
        let protocol: Error = TransportError::protocol("bad frame").into();

        assert!(stream.is_recoverable());
        assert!(!protocol.is_recoverable());
        assert!(!Error::Destroyed.is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
