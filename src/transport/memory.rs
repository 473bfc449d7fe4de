//! In-process transport.
//!
//! [`MemoryTransport`] never touches the network. Every link it opens is
//! recorded as a [`MemoryPeer`] that the caller drives by hand: accept the
//! connection, push frames, fail it, or close it from the remote side.
//! Useful for tests and for embedding a session behind a custom channel.
//!
//! # Example
//!
//! ```ignore
//! use tether::{MemoryTransport, Session};
//!
//! let transport = MemoryTransport::websocket();
//! let session = Session::builder(transport.clone())
//!     .endpoint("ws://in-memory/feed")
//!     .build()?;
//!
//! let peer = transport.last_peer().expect("connect opened a link");
//! peer.accept();
//! peer.push_text(r#"{"type":"ping"}"#);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use url::Url;

use crate::error::TransportError;
use crate::protocol::{CloseInfo, Frame};

use super::link::{Link, LinkCommand, Remote};
use super::{EventSourceKind, Kind, OpenRequest, Transport, WebSocketKind};

// ============================================================================
// MemoryTransport
// ============================================================================

/// Transport whose links are driven by the caller.
///
/// Cloning shares the recorded peers.
pub struct MemoryTransport<K = WebSocketKind> {
    peers: Arc<Mutex<Vec<MemoryPeer>>>,
    _kind: PhantomData<fn() -> K>,
}

impl MemoryTransport<WebSocketKind> {
    /// Creates a transport with WebSocket semantics.
    #[inline]
    #[must_use]
    pub fn websocket() -> Self {
        Self::new()
    }
}

impl MemoryTransport<EventSourceKind> {
    /// Creates a transport with event-stream semantics.
    #[inline]
    #[must_use]
    pub fn event_source() -> Self {
        Self::new()
    }
}

impl<K: Kind> MemoryTransport<K> {
    /// Creates a transport with no peers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: Arc::new(Mutex::new(Vec::new())),
            _kind: PhantomData,
        }
    }

    /// Returns every peer opened so far, oldest first.
    #[must_use]
    pub fn peers(&self) -> Vec<MemoryPeer> {
        self.peers.lock().clone()
    }

    /// Returns the peer at `index` in open order.
    #[must_use]
    pub fn peer(&self, index: usize) -> Option<MemoryPeer> {
        self.peers.lock().get(index).cloned()
    }

    /// Returns the most recently opened peer.
    #[must_use]
    pub fn last_peer(&self) -> Option<MemoryPeer> {
        self.peers.lock().last().cloned()
    }

    /// Returns the number of links opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Returns the number of peers a session is still attached to.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.peers.lock().iter().filter(|peer| peer.is_attached()).count()
    }
}

impl<K: Kind> Default for MemoryTransport<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for MemoryTransport<K> {
    fn clone(&self) -> Self {
        Self {
            peers: Arc::clone(&self.peers),
            _kind: PhantomData,
        }
    }
}

impl<K: Kind> std::fmt::Debug for MemoryTransport<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("kind", &K::KIND)
            .field("peers", &self.open_count())
            .finish()
    }
}

impl<K: Kind> Transport for MemoryTransport<K> {
    type Kind = K;

    fn open(&self, request: OpenRequest) -> Link {
        let (link, remote) = Link::pair(K::KIND);
        self.peers.lock().push(MemoryPeer::new(request, remote));
        link
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Remote end of one in-memory link.
#[derive(Clone)]
pub struct MemoryPeer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    request: OpenRequest,
    remote: Mutex<Remote>,
    sent: Mutex<Vec<Frame>>,
    close_requested: AtomicBool,
}

impl MemoryPeer {
    fn new(request: OpenRequest, remote: Remote) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                request,
                remote: Mutex::new(remote),
                sent: Mutex::new(Vec::new()),
                close_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the request the link was opened with.
    #[inline]
    #[must_use]
    pub fn request(&self) -> &OpenRequest {
        &self.inner.request
    }

    /// Returns the endpoint the link was opened with.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.request.endpoint
    }

    /// Completes the handshake.
    ///
    /// Returns `false` if the session no longer listens.
    pub fn accept(&self) -> bool {
        self.inner.remote.lock().opened()
    }

    /// Delivers a frame to the session.
    pub fn push(&self, frame: impl Into<Frame>) -> bool {
        self.inner.remote.lock().message(frame.into())
    }

    /// Delivers a text frame to the session.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push(Frame::Text(text.into()))
    }

    /// Fails the established connection.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.inner.remote.lock().failed(TransportError::stream(message))
    }

    /// Rejects the connection attempt.
    pub fn refuse(&self, message: impl Into<String>) -> bool {
        self.inner.remote.lock().failed(TransportError::connect(message))
    }

    /// Closes the connection from the remote side.
    pub fn close_remote(&self, code: u16, reason: impl Into<String>) -> bool {
        self.inner
            .remote
            .lock()
            .closed(Some(CloseInfo::new(code, reason)))
    }

    /// Completes a close requested by the session.
    pub fn finish_close(&self) -> bool {
        self.close_remote(CloseInfo::NORMAL, "")
    }

    /// Returns `true` while a session listens to this link.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.inner.remote.lock().is_detached()
    }

    /// Returns the raw ready-state code.
    #[must_use]
    pub fn ready_state(&self) -> u8 {
        self.inner.remote.lock().ready_state().get()
    }

    /// Returns every frame the session sent, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Frame> {
        self.drain();
        self.inner.sent.lock().clone()
    }

    /// Returns the sent frames that are text.
    #[must_use]
    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` once the session asked to close the link.
    #[must_use]
    pub fn close_requested(&self) -> bool {
        self.drain();
        self.inner.close_requested.load(Ordering::Acquire)
    }

    fn drain(&self) {
        let mut remote = self.inner.remote.lock();
        while let Some(command) = remote.try_command() {
            match command {
                LinkCommand::Send(frame) => self.inner.sent.lock().push(frame),
                LinkCommand::Close => self.inner.close_requested.store(true, Ordering::Release),
            }
        }
    }
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPeer")
            .field("endpoint", &self.endpoint().as_str())
            .field("ready_state", &self.ready_state())
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::{Status, TransportKind};
    use crate::transport::LinkEvent;

    fn request() -> OpenRequest {
        OpenRequest::new(Url::parse("ws://in-memory/feed").expect("valid url"))
    }

    #[test]
    fn test_open_records_peer() {
        let transport = MemoryTransport::websocket();
        let _link = transport.open(request());

        assert_eq!(transport.open_count(), 1);
        let peer = transport.last_peer().expect("peer recorded");
        assert_eq!(peer.endpoint().as_str(), "ws://in-memory/feed");
        assert_eq!(peer.ready_state(), TransportKind::CONNECTING);
        assert!(peer.is_attached());
    }

    #[test]
    fn test_peer_drives_link() {
        let transport = MemoryTransport::websocket();
        let (handle, mut events) = transport.open(request()).into_parts();
        let peer = transport.last_peer().expect("peer recorded");

        assert!(peer.accept());
        assert!(peer.push_text("hello"));
        assert_eq!(handle.status(), Status::Open);
        assert_eq!(events.try_recv().ok(), Some(LinkEvent::Open));
        assert_eq!(
            events.try_recv().ok(),
            Some(LinkEvent::Message(Frame::from("hello")))
        );
    }

    #[test]
    fn test_sent_and_close_requested() {
        let transport = MemoryTransport::websocket();
        let (handle, _events) = transport.open(request()).into_parts();
        let peer = transport.last_peer().expect("peer recorded");
        peer.accept();

        handle.send(Frame::from("a")).expect("send should succeed");
        handle.send(Frame::from(vec![1u8, 2])).expect("send should succeed");
        assert!(!peer.close_requested());

        handle.close();
        assert_eq!(peer.sent_text(), vec!["a".to_string()]);
        assert_eq!(peer.sent().len(), 2);
        assert!(peer.close_requested());
    }

    #[test]
    fn test_detaches_when_link_dropped() {
        let transport = MemoryTransport::websocket();
        let link = transport.open(request());
        let _second = transport.open(request());
        assert_eq!(transport.attached_count(), 2);

        drop(link);
        assert_eq!(transport.attached_count(), 1);
        assert!(!transport.peer(0).expect("first peer").accept());
    }

    #[test]
    fn test_event_source_kind() {
        let transport = MemoryTransport::event_source();
        let (handle, mut events) = transport.open(request()).into_parts();
        let peer = transport.last_peer().expect("peer recorded");

        peer.accept();
        let _ = events.try_recv();
        peer.close_remote(CloseInfo::NORMAL, "done");
        assert_eq!(handle.status(), Status::Closed);
        assert!(events.try_recv().is_err());
    }
}
