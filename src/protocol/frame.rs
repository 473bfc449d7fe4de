//! Frame types carried by links.
//!
//! A [`Frame`] is one unit of data received from (or sent to) the remote
//! end. WebSocket transports produce text and binary frames; event-stream
//! transports produce [`ServerEvent`]s.

// ============================================================================
// Imports
// ============================================================================

use std::str;
use std::time::Duration;

use bytes::Bytes;

// ============================================================================
// Frame
// ============================================================================

/// A single frame exchanged over a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
    /// Server-sent event.
    Event(ServerEvent),
}

impl Frame {
    /// Returns the textual content of the frame, if any.
    ///
    /// Text frames return their content, events return their data and
    /// binary frames return their bytes when they are valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Event(event) => Some(&event.data),
            Self::Binary(bytes) => str::from_utf8(bytes).ok(),
        }
    }

    /// Returns `true` for text frames.
    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns the number of payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
            Self::Event(event) => event.data.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<ServerEvent> for Frame {
    fn from(event: ServerEvent) -> Self {
        Self::Event(event)
    }
}

// ============================================================================
// ServerEvent
// ============================================================================

/// Event dispatched by an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Event type (`"message"` when the stream did not name one).
    pub event: String,
    /// Event data, multi-line data joined with `\n`.
    pub data: String,
    /// Last event ID in effect when the event was dispatched.
    pub id: Option<String>,
    /// Reconnection time advertised by the server.
    pub retry: Option<Duration>,
}

impl ServerEvent {
    /// Default event type.
    pub const MESSAGE: &'static str = "message";

    /// Creates an unnamed event with the given data.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: Self::MESSAGE.to_owned(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// Sets the event type.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    /// Sets the event ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

// ============================================================================
// CloseInfo
// ============================================================================

/// Close handshake details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close status code.
    pub code: u16,
    /// Close reason.
    pub reason: String,
}

impl CloseInfo {
    /// Normal closure code.
    pub const NORMAL: u16 = 1000;

    /// Creates close details.
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Returns `true` for a normal closure.
    #[inline]
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == Self::NORMAL
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_text() {
        assert_eq!(Frame::from("hi").as_text(), Some("hi"));
        assert_eq!(Frame::from(vec![b'o', b'k']).as_text(), Some("ok"));
        assert_eq!(Frame::from(vec![0xff, 0xfe]).as_text(), None);
        assert_eq!(
            Frame::from(ServerEvent::message("data")).as_text(),
            Some("data")
        );
    }

    #[test]
    fn test_len() {
        assert_eq!(Frame::from("abc").len(), 3);
        assert!(Frame::from("").is_empty());
        assert_eq!(Frame::from(vec![1, 2]).len(), 2);
    }

    #[test]
    fn test_server_event_builders() {
        let event = ServerEvent::message("x").with_event("notice").with_id("42");
        assert_eq!(event.event, "notice");
        assert_eq!(event.id.as_deref(), Some("42"));
        assert_eq!(event.retry, None);
    }

    #[test]
    fn test_close_info() {
        assert!(CloseInfo::new(1000, "bye").is_normal());
        assert!(!CloseInfo::new(1011, "error").is_normal());
    }
}
