//! Session status and ready-state mapping.
//!
//! Links report their phase as a small integer ready state, following the
//! browser `WebSocket` and `EventSource` conventions. [`TransportKind`]
//! translates those codes into a [`Status`].
//!
//! | Code | WebSocket | EventSource |
//! |------|-----------|-------------|
//! | 0 | `Connecting` | `Connecting` |
//! | 1 | `Open` | `Open` |
//! | 2 | `Closing` | `Closed` |
//! | 3 | `Closed` | - |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Status
// ============================================================================

/// Named connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// No connection attempt has been made yet.
    #[default]
    Pending,
    /// A connection is being established.
    Connecting,
    /// The connection is open.
    Open,
    /// A close handshake is in progress.
    Closing,
    /// The connection is closed.
    Closed,
}

impl Status {
    /// Returns `true` when the session is open.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` when the session is closed.
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// TransportKind
// ============================================================================

/// Family of a transport, which fixes its ready-state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Full-duplex socket with a close handshake.
    WebSocket,
    /// Server-to-client event stream without a closing phase.
    EventSource,
}

impl TransportKind {
    /// Ready state while connecting.
    pub const CONNECTING: u8 = 0;

    /// Ready state once open.
    pub const OPEN: u8 = 1;

    /// Maps a ready-state code to a status.
    ///
    /// Codes outside the kind's table map to [`Status::Closed`].
    #[must_use]
    pub const fn status(self, ready_state: u8) -> Status {
        match (self, ready_state) {
            (_, 0) => Status::Connecting,
            (_, 1) => Status::Open,
            (Self::WebSocket, 2) => Status::Closing,
            _ => Status::Closed,
        }
    }

    /// Ready state entered when a close is requested locally.
    #[must_use]
    pub const fn closing_state(self) -> u8 {
        match self {
            Self::WebSocket => 2,
            Self::EventSource => self.closed_state(),
        }
    }

    /// Ready state of a closed link.
    #[must_use]
    pub const fn closed_state(self) -> u8 {
        match self {
            Self::WebSocket => 3,
            Self::EventSource => 2,
        }
    }

    /// Returns `true` if the kind reports close events.
    #[inline]
    #[must_use]
    pub const fn has_close_event(self) -> bool {
        matches!(self, Self::WebSocket)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_table() {
        let kind = TransportKind::WebSocket;
        assert_eq!(kind.status(0), Status::Connecting);
        assert_eq!(kind.status(1), Status::Open);
        assert_eq!(kind.status(2), Status::Closing);
        assert_eq!(kind.status(3), Status::Closed);
    }

    #[test]
    fn test_event_source_table() {
        let kind = TransportKind::EventSource;
        assert_eq!(kind.status(0), Status::Connecting);
        assert_eq!(kind.status(1), Status::Open);
        assert_eq!(kind.status(2), Status::Closed);
    }

    #[test]
    fn test_unknown_codes_are_closed() {
        assert_eq!(TransportKind::WebSocket.status(9), Status::Closed);
        assert_eq!(TransportKind::EventSource.status(3), Status::Closed);
    }

    #[test]
    fn test_closing_state() {
        let ws = TransportKind::WebSocket;
        let sse = TransportKind::EventSource;
        assert_eq!(ws.status(ws.closing_state()), Status::Closing);
        assert_eq!(sse.status(sse.closing_state()), Status::Closed);
        assert_eq!(ws.status(ws.closed_state()), Status::Closed);
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(Status::default(), Status::Pending);
        assert_eq!(Status::Open.to_string(), "OPEN");
    }
}
