//! Link: the session's view of one physical connection.
//!
//! A link is a pair of channels plus a shared ready-state cell. The session
//! keeps the [`Link`] side; the transport driver task keeps the [`Remote`]
//! side.
//!
//! ```text
//! ┌──────────────┐   LinkCommand (Send, Close)    ┌──────────────┐
//! │   Session    │ ─────────────────────────────► │   Driver     │
//! │  LinkHandle  │                                │   Remote     │
//! │  LinkEvents  │ ◄───────────────────────────── │              │
//! └──────────────┘   LinkEvent (Open, Message,    └──────────────┘
//!                     Close, Error)
//! ```
//!
//! Dropping the session side closes the command channel, which tells the
//! driver to shut down.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result, TransportError};
use crate::protocol::{CloseInfo, Frame};
use crate::session::{Status, TransportKind};

// ============================================================================
// Types
// ============================================================================

/// Receiver of lifecycle events for one link.
pub type LinkEvents = mpsc::UnboundedReceiver<LinkEvent>;

// ============================================================================
// LinkEvent / LinkCommand
// ============================================================================

/// Lifecycle event emitted by a transport driver.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection opened.
    Open,
    /// A frame arrived.
    Message(Frame),
    /// The connection closed cleanly.
    Close(Option<CloseInfo>),
    /// The connection failed.
    Error(TransportError),
}

/// Command sent from the session to a transport driver.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// Write a frame.
    Send(Frame),
    /// Start a graceful close.
    Close,
}

// ============================================================================
// ReadyStateCell
// ============================================================================

/// Ready-state code shared between a link and its driver.
#[derive(Debug, Clone, Default)]
pub struct ReadyStateCell(Arc<AtomicU8>);

impl ReadyStateCell {
    /// Returns the current code.
    #[inline]
    #[must_use]
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    /// Stores a new code.
    #[inline]
    pub fn set(&self, ready_state: u8) {
        self.0.store(ready_state, Ordering::Release);
    }
}

// ============================================================================
// Link
// ============================================================================

/// Session side of a physical connection.
pub struct Link {
    handle: LinkHandle,
    events: LinkEvents,
}

impl Link {
    /// Creates a connected link/remote pair in the `CONNECTING` state.
    #[must_use]
    pub fn pair(kind: TransportKind) -> (Self, Remote) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let ready_state = ReadyStateCell::default();
        ready_state.set(TransportKind::CONNECTING);

        let link = Self {
            handle: LinkHandle {
                commands: command_tx,
                ready_state: ready_state.clone(),
                kind,
            },
            events: event_rx,
        };
        let remote = Remote {
            events: event_tx,
            commands: command_rx,
            ready_state,
            kind,
        };

        (link, remote)
    }

    /// Returns the control handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &LinkHandle {
        &self.handle
    }

    /// Splits the link into its control handle and event receiver.
    #[must_use]
    pub fn into_parts(self) -> (LinkHandle, LinkEvents) {
        (self.handle, self.events)
    }
}

// ============================================================================
// LinkHandle
// ============================================================================

/// Control handle of a link.
#[derive(Debug)]
pub struct LinkHandle {
    commands: mpsc::UnboundedSender<LinkCommand>,
    ready_state: ReadyStateCell,
    kind: TransportKind,
}

impl LinkHandle {
    /// Returns the raw ready-state code.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> u8 {
        self.ready_state.get()
    }

    /// Returns the mapped status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.kind.status(self.ready_state())
    }

    /// Returns `true` if the link is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ready_state() == TransportKind::OPEN
    }

    /// Queues a frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the link is not open or its driver
    /// has stopped.
    pub fn send(&self, frame: Frame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        self.commands
            .send(LinkCommand::Send(frame))
            .map_err(|_| Error::NotConnected)
    }

    /// Requests a graceful close.
    ///
    /// The ready state moves to the kind's closing state immediately.
    pub fn close(&self) {
        self.ready_state.set(self.kind.closing_state());
        if self.commands.send(LinkCommand::Close).is_err() {
            trace!("Close requested on stopped link");
        }
    }
}

// ============================================================================
// Remote
// ============================================================================

/// Driver side of a link.
#[derive(Debug)]
pub struct Remote {
    events: mpsc::UnboundedSender<LinkEvent>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    ready_state: ReadyStateCell,
    kind: TransportKind,
}

impl Remote {
    /// Returns the transport kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Returns the shared ready-state cell.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> &ReadyStateCell {
        &self.ready_state
    }

    /// Returns `true` once the session stopped listening to this link.
    ///
    /// Dropping either the control handle or the event receiver detaches.
    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.events.is_closed() || self.commands.is_closed()
    }

    /// Emits an event. Returns `false` if the session stopped listening.
    pub fn emit(&self, event: LinkEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Marks the link open and emits [`LinkEvent::Open`].
    pub fn opened(&self) -> bool {
        self.ready_state.set(TransportKind::OPEN);
        self.emit(LinkEvent::Open)
    }

    /// Emits a received frame.
    pub fn message(&self, frame: Frame) -> bool {
        self.emit(LinkEvent::Message(frame))
    }

    /// Marks the link closed and emits [`LinkEvent::Error`].
    pub fn failed(&self, error: TransportError) -> bool {
        self.ready_state.set(self.kind.closed_state());
        self.emit(LinkEvent::Error(error))
    }

    /// Marks the link closed and emits [`LinkEvent::Close`].
    ///
    /// Event-stream links have no close event and only update their state.
    pub fn closed(&self, info: Option<CloseInfo>) -> bool {
        self.ready_state.set(self.kind.closed_state());
        if self.kind.has_close_event() {
            self.emit(LinkEvent::Close(info))
        } else {
            !self.is_detached()
        }
    }

    /// Waits for the next command. `None` means the session dropped the link.
    pub async fn next_command(&mut self) -> Option<LinkCommand> {
        self.commands.recv().await
    }

    /// Takes a queued command without waiting.
    pub fn try_command(&mut self) -> Option<LinkCommand> {
        self.commands.try_recv().ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_starts_connecting() {
        let (link, remote) = Link::pair(TransportKind::WebSocket);
        assert_eq!(link.handle().status(), Status::Connecting);
        assert_eq!(remote.ready_state().get(), TransportKind::CONNECTING);
    }

    #[test]
    fn test_send_requires_open() {
        let (link, mut remote) = Link::pair(TransportKind::WebSocket);
        assert!(matches!(
            link.handle().send(Frame::from("early")),
            Err(Error::NotConnected)
        ));

        remote.opened();
        link.handle().send(Frame::from("hello")).expect("send should succeed");
        assert_eq!(
            remote.try_command(),
            Some(LinkCommand::Send(Frame::from("hello")))
        );
    }

    #[test]
    fn test_close_sets_closing_state() {
        let (ws, mut ws_remote) = Link::pair(TransportKind::WebSocket);
        ws_remote.opened();
        ws.handle().close();
        assert_eq!(ws.handle().status(), Status::Closing);
        assert_eq!(ws_remote.try_command(), Some(LinkCommand::Close));

        let (sse, _sse_remote) = Link::pair(TransportKind::EventSource);
        sse.handle().close();
        assert_eq!(sse.handle().status(), Status::Closed);
    }

    #[test]
    fn test_events_flow_to_link() {
        let (link, remote) = Link::pair(TransportKind::WebSocket);
        let (_handle, mut events) = link.into_parts();

        assert!(remote.opened());
        assert!(remote.message(Frame::from("x")));
        assert_eq!(events.try_recv().ok(), Some(LinkEvent::Open));
        assert_eq!(
            events.try_recv().ok(),
            Some(LinkEvent::Message(Frame::from("x")))
        );
    }

    #[test]
    fn test_detached_after_drop() {
        let (link, remote) = Link::pair(TransportKind::WebSocket);
        assert!(!remote.is_detached());
        drop(link);
        assert!(remote.is_detached());
        assert!(!remote.opened());
    }

    #[test]
    fn test_next_command_wakes_driver() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let (link, mut remote) = Link::pair(TransportKind::WebSocket);
        let mut next = task::spawn(remote.next_command());
        assert_pending!(next.poll());

        link.handle().close();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(LinkCommand::Close));
    }

    #[test]
    fn test_next_command_ends_when_link_dropped() {
        use tokio_test::{assert_ready_eq, task};

        let (link, mut remote) = Link::pair(TransportKind::EventSource);
        drop(link);
        let mut next = task::spawn(remote.next_command());
        assert_ready_eq!(next.poll(), None);
    }

    #[test]
    fn test_event_source_close_has_no_event() {
        let (link, remote) = Link::pair(TransportKind::EventSource);
        let (handle, mut events) = link.into_parts();
        remote.opened();
        remote.closed(None);

        assert_eq!(handle.status(), Status::Closed);
        assert_eq!(events.try_recv().ok(), Some(LinkEvent::Open));
        assert!(events.try_recv().is_err());
    }
}
