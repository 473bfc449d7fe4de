//! Transport layer.
//!
//! A [`Transport`] turns an [`OpenRequest`] into a [`Link`]: it spawns a
//! driver task that owns the physical connection and reports lifecycle
//! events back to the session. Transports never fail synchronously; every
//! failure is reported as [`LinkEvent::Error`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session        │         Link                 │  Driver task    │
//! │                 │◄────────────────────────────►│                 │
//! │  Generation N   │   events / commands          │  WebSocket or   │
//! │                 │   ready state                │  event stream   │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `link` | Link, handle, remote and event types |
//! | `memory` | In-process transport driven by the caller |
//! | `sse` | Server-Sent Events over HTTP |
//! | `websocket` | WebSocket over tokio-tungstenite |

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::session::TransportKind;

// ============================================================================
// Submodules
// ============================================================================

/// Link, handle, remote and event types.
pub mod link;

/// In-process transport.
pub mod memory;

/// Server-Sent Events transport.
pub mod sse;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use link::{Link, LinkCommand, LinkEvent, LinkEvents, LinkHandle, ReadyStateCell, Remote};
pub use memory::{MemoryPeer, MemoryTransport};
pub use sse::{SseOptions, SseTransport};
pub use websocket::WsTransport;

// ============================================================================
// Kind markers
// ============================================================================

/// Compile-time transport family.
pub trait Kind: Send + Sync + 'static {
    /// Runtime value of the family.
    const KIND: TransportKind;
}

/// Marker for full-duplex socket transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketKind;

impl Kind for WebSocketKind {
    const KIND: TransportKind = TransportKind::WebSocket;
}

/// Marker for server-to-client event stream transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSourceKind;

impl Kind for EventSourceKind {
    const KIND: TransportKind = TransportKind::EventSource;
}

// ============================================================================
// Transport
// ============================================================================

/// Factory for physical connections.
///
/// Implementations must be called from within a Tokio runtime.
pub trait Transport: Send + Sync + 'static {
    /// Transport family.
    type Kind: Kind;

    /// Starts opening a connection.
    fn open(&self, request: OpenRequest) -> Link;
}

// ============================================================================
// OpenRequest / TransportOptions
// ============================================================================

/// Per-connection transport options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// WebSocket subprotocols, in preference order.
    pub protocols: Vec<String>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl TransportOptions {
    /// Creates empty options.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            protocols: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Adds a subprotocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds a request header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Everything a transport needs to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Target endpoint.
    pub endpoint: Url,
    /// Transport options.
    pub options: TransportOptions,
    /// Last event ID seen by the session (event streams resume from it).
    pub last_event_id: Option<String>,
}

impl OpenRequest {
    /// Creates a request with default options.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            options: TransportOptions::default(),
            last_event_id: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
