//! Incremental `text/event-stream` parser.
//!
//! Bytes are fed in arbitrary chunks; complete events come out. Follows the
//! HTML event-stream interpretation rules:
//!
//! - A leading UTF-8 byte order mark is skipped
//! - Lines end with LF, CR or CRLF (a CRLF split across chunks counts once)
//! - Lines starting with `:` are comments
//! - `event`, `data`, `id` and `retry` fields are recognized, others ignored
//! - A blank line dispatches the pending event if it carries data
//! - An event left incomplete at end of stream is discarded

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::protocol::ServerEvent;

// ============================================================================
// Constants
// ============================================================================

const LF: u8 = b'\n';
const CR: u8 = b'\r';
const BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// EventParser
// ============================================================================

/// Push parser turning byte chunks into [`ServerEvent`]s.
#[derive(Debug, Default)]
pub struct EventParser {
    buffer: BytesMut,
    started: bool,
    event: String,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl EventParser {
    /// Creates a parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last event ID seen, if the stream ever set one.
    ///
    /// An empty ID means the stream reset it.
    #[inline]
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feeds a chunk and returns the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend_from_slice(chunk);

        if !self.started {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Vec::new();
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.advance(BOM.len());
            }
            self.started = true;
        }

        let mut events = Vec::new();
        while let Some(line) = self.next_line() {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Signals end of stream and returns any event completed by a trailing
    /// CR.
    pub fn finish(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        if self.buffer.last() == Some(&CR) {
            let length = self.buffer.len() - 1;
            let line = self.buffer.split_to(length);
            self.buffer.clear();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        // Anything still pending never saw its blank line
        self.buffer.clear();
        self.reset_event();
        events
    }

    /// Splits the next complete line off the buffer.
    fn next_line(&mut self) -> Option<BytesMut> {
        let position = memchr::memchr2(LF, CR, &self.buffer)?;

        let terminator = if self.buffer[position] == LF {
            1
        } else if position + 1 < self.buffer.len() {
            if self.buffer[position + 1] == LF { 2 } else { 1 }
        } else {
            // Lone CR at the end: wait to see if LF follows
            return None;
        };

        let line = self.buffer.split_to(position);
        self.buffer.advance(terminator);
        Some(line)
    }

    fn process_line(&mut self, line: &[u8]) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line[0] == b':' {
            return None;
        }

        let (name, value) = match memchr::memchr(b':', line) {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };
        let value = String::from_utf8_lossy(value);

        match name {
            b"event" => self.event = value.into_owned(),
            b"data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(&value);
                self.has_data = true;
            }
            b"id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.into_owned());
                }
            }
            b"retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(millis) = value.parse::<u64>()
                {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        if !self.has_data {
            self.reset_event();
            return None;
        }

        let event = if self.event.is_empty() {
            ServerEvent::MESSAGE.to_owned()
        } else {
            std::mem::take(&mut self.event)
        };

        let dispatched = ServerEvent {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
            retry: self.retry.take(),
        };
        self.reset_event();
        Some(dispatched)
    }

    fn reset_event(&mut self) {
        self.event.clear();
        self.data.clear();
        self.has_data = false;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Vec<ServerEvent> {
        let mut parser = EventParser::new();
        let mut events = parser.feed(input);
        events.extend(parser.finish());
        events
    }

    #[test]
    fn test_single_data_event() {
        let events = parse(b"data: Hello, world!\n\n");
        assert_eq!(events, vec![ServerEvent::message("Hello, world!")]);
    }

    #[test]
    fn test_multiline_data() {
        let events = parse(b"data: first\ndata: second\ndata\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first\nsecond\n");
    }

    #[test]
    fn test_named_event_and_id() {
        let events = parse(b"event: update\nid: 7\ndata: {}\n\ndata: next\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "update");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        // Event type resets, ID persists
        assert_eq!(events[1].event, "message");
        assert_eq!(events[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_empty_id_resets() {
        let mut parser = EventParser::new();
        parser.feed(b"id: 1\ndata: a\n\nid\ndata: b\n\n");
        assert_eq!(parser.last_event_id(), Some(""));
    }

    #[test]
    fn test_id_with_null_is_ignored() {
        let events = parse(b"id: 1\ndata: a\n\nid: x\0y\ndata: b\n\n");
        assert_eq!(events[1].id.as_deref(), Some("1"));
    }

    #[test]
    fn test_line_endings() {
        let events = parse(b"data: a\r\n\r\ndata: b\r\rdata: c\n\n");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"data: a\r").is_empty());
        assert!(parser.feed(b"\n").is_empty());
        let events = parser.feed(b"\r\n");
        assert_eq!(events, vec![ServerEvent::message("a")]);
    }

    #[test]
    fn test_bom_skipped() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"\xEF\xBB").is_empty());
        let events = parser.feed(b"\xBFdata: x\n\n");
        assert_eq!(events, vec![ServerEvent::message("x")]);
    }

    #[test]
    fn test_comments_and_unknown_fields() {
        let events = parse(b": keep-alive\nfoo: bar\ndata: x\n\n");
        assert_eq!(events, vec![ServerEvent::message("x")]);
    }

    #[test]
    fn test_retry_field() {
        let events = parse(b"retry: 2500\ndata: x\n\nretry: soon\ndata: y\n\n");
        assert_eq!(events[0].retry, Some(Duration::from_millis(2500)));
        assert_eq!(events[1].retry, None);
    }

    #[test]
    fn test_event_without_data_not_dispatched() {
        assert!(parse(b"event: ping\n\n").is_empty());
    }

    #[test]
    fn test_incomplete_event_discarded() {
        assert!(parse(b"data: partial\n").is_empty());
        assert!(parse(b"data: partial").is_empty());
    }

    #[test]
    fn test_trailing_cr_at_end_of_stream() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"data: x\n\r").is_empty());
        assert_eq!(parser.finish(), vec![ServerEvent::message("x")]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = b"event: tick\ndata: 1\n\n";
        let mut parser = EventParser::new();
        let mut events = Vec::new();
        for byte in input {
            events.extend(parser.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(events, vec![ServerEvent::message("1").with_event("tick")]);
    }
}
