//! Reconnecting sessions.
//!
//! A [`Session`] drives one logical connection over any [`Transport`]
//! (WebSocket, Server-Sent Events or in-memory), reconnecting under a
//! [`RetryPolicy`], keeping a bounded [`History`] of frames and routing
//! decoded messages to registered handlers.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether::{RetryPolicy, Session, WsTransport};
//!
//! let session = Session::builder(WsTransport::new())
//!     .endpoint("wss://example.com/feed")
//!     .auto_retry(RetryPolicy::new(3, Duration::from_secs(1)))
//!     .decode(true)
//!     .build()?;
//!
//! let ping = session.register_handler("ping", |payload| {
//!     tracing::info!(%payload, "ping");
//! });
//!
//! session.send_text("hello")?;
//! ping.unregister();
//! session.destroy();
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent session configuration |
//! | `core` | Session state machine and event pump |
//! | `handlers` | Discriminator-keyed handler registry |
//! | `history` | Bounded FIFO history |
//! | `options` | Session options and heartbeat |
//! | `retry` | Retry policy |
//! | `status` | Status enum and ready-state mapping |
//!
//! [`Transport`]: crate::transport::Transport

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::transport::{SseTransport, WsTransport};

// ============================================================================
// Submodules
// ============================================================================

/// Fluent session configuration.
pub mod builder;

/// Session state machine.
pub mod core;

/// Handler registry.
pub mod handlers;

/// Bounded history.
pub mod history;

/// Session options.
pub mod options;

/// Retry policy.
pub mod retry;

/// Status and ready-state mapping.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use self::core::{Session, SessionEvent};
pub use handlers::{Handler, HandlerRegistry, Registration};
pub use history::{DEFAULT_HISTORY_CAPACITY, History};
pub use options::{DEFAULT_EVENT_CAPACITY, Heartbeat, SessionOptions};
pub use retry::{ExhaustedFn, RetryDecision, RetryPolicy};
pub use status::{Status, TransportKind};

// ============================================================================
// Type Aliases
// ============================================================================

/// Session over a WebSocket.
pub type WebSocketSession = Session<WsTransport>;

/// Session over a Server-Sent Events stream.
pub type EventSourceSession = Session<SseTransport>;

impl Session<WsTransport> {
    /// Creates a builder for a WebSocket session with default transport
    /// settings.
    #[must_use]
    pub fn websocket() -> SessionBuilder<WsTransport> {
        SessionBuilder::new(WsTransport::new())
    }
}

impl Session<SseTransport> {
    /// Creates a builder for an event-stream session with default transport
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the HTTP client cannot
    /// be initialized.
    pub fn event_source() -> Result<SessionBuilder<SseTransport>> {
        Ok(SessionBuilder::new(SseTransport::new()?))
    }
}
