//! Tether - Reconnecting WebSocket and Server-Sent Events sessions.
//!
//! This library keeps one logical connection alive over an unreliable
//! physical one, and routes typed messages to handlers.
//!
//! # Architecture
//!
//! The crate follows a session/transport split:
//!
//! - **Session**: Owns state, retry policy, history and handlers
//! - **Transport**: Opens physical connections and reports their lifecycle
//!
//! Key design principles:
//!
//! - Each connection attempt is a *generation*; events from superseded
//!   generations are never observed
//! - At most one physical connection per session at any time
//! - Handlers are keyed by a discriminator field of decoded JSON payloads
//! - Event-driven architecture (no polling)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use tether::{RetryPolicy, Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::websocket()
//!         .endpoint("wss://example.com/feed")
//!         .auto_retry(RetryPolicy::new(5, Duration::from_secs(1)))
//!         .decode(true)
//!         .build()?;
//!
//!     let _ticker = session.register_handler("ticker", |payload| {
//!         println!("ticker: {payload}");
//!     });
//!
//!     let mut events = session.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!
//!     session.destroy();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frames, events and payload decoding |
//! | [`session`] | [`Session`], builder, retry, history, handlers |
//! | [`transport`] | [`Transport`] trait and WebSocket, SSE, memory transports |
//!
//! # Features
//!
//! - **Bounded retry**: Fixed-delay reconnection with an exhaustion callback
//! - **Typed dispatch**: Serde-deserialized handlers per message type
//! - **Heartbeat**: Optional ping/pong liveness checks for WebSocket sessions
//! - **Testable**: [`MemoryTransport`] drives sessions without a network

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for generations and handlers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Frames, server events and payload decoding.
pub mod protocol;

/// Reconnecting sessions.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod session;

/// Transport layer.
///
/// WebSocket, Server-Sent Events and in-memory transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result, TransportError, TransportErrorKind};

// Identifier types
pub use identifiers::{GenerationId, HandlerId};

// Protocol types
pub use protocol::{
    AsyncDecoder, CloseInfo, DEFAULT_DISCRIMINATOR, DecodeFn, DecodeMode, Decoder, Envelope,
    Frame, ServerEvent,
};

// Session types
pub use session::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_HISTORY_CAPACITY, EventSourceSession, ExhaustedFn, Handler,
    HandlerRegistry, Heartbeat, History, Registration, RetryDecision, RetryPolicy, Session,
    SessionBuilder, SessionEvent, SessionOptions, Status, TransportKind, WebSocketSession,
};

// Transport types
pub use transport::{
    EventSourceKind, Kind, Link, LinkEvent, LinkHandle, MemoryPeer, MemoryTransport, OpenRequest,
    SseOptions, SseTransport, Transport, TransportOptions, WebSocketKind, WsTransport,
};
