//! Session state machine.
//!
//! A [`Session`] owns at most one link at a time. Each link is wrapped in a
//! generation with its own cancellation token and an event pump task. The
//! pump and retry timers hold weak references, so dropping every session
//! handle tears the connection down.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──connect──► Connecting ──► Open ──close──► Closing ──► Closed
//!                          ▲                                         │
//!                          └──────── reconnect / retry timer ◄───────┘
//! ```
//!
//! `destroy()` is terminal from any state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::pending;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result, TransportError};
use crate::identifiers::{GenerationId, IdSequence};
use crate::protocol::{CloseInfo, Decoder, Frame};
use crate::transport::{
    Kind, LinkEvent, LinkEvents, LinkHandle, OpenRequest, Transport, TransportOptions,
    WebSocketKind,
};

use super::builder::SessionBuilder;
use super::handlers::{HandlerRegistry, Registration};
use super::history::History;
use super::options::{Heartbeat, SessionOptions};
use super::retry::{RetryDecision, RetryPolicy};
use super::status::{Status, TransportKind};

// ============================================================================
// SessionEvent
// ============================================================================

/// Lifecycle notification broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A connection opened.
    Open,
    /// A frame was received.
    Message(Frame),
    /// The connection closed cleanly.
    Close(Option<CloseInfo>),
    /// The connection failed.
    Error(TransportError),
}

// ============================================================================
// Internal State
// ============================================================================

/// One physical connection and the scope of its listeners.
struct Generation {
    id: GenerationId,
    link: LinkHandle,
    token: CancellationToken,
}

impl Generation {
    /// Closes the link if open and detaches the pump.
    fn teardown(self) {
        if self.link.is_open() {
            self.link.close();
        }
        self.token.cancel();
        trace!(generation = %self.id, "Generation torn down");
    }
}

/// Pending reconnect.
struct RetryTimer {
    ticket: u64,
    token: CancellationToken,
}

struct State {
    endpoint: Option<Url>,
    transport: TransportOptions,
    generation: Option<Generation>,
    retry_timer: Option<RetryTimer>,
    retry_count: u32,
    last_error: Option<TransportError>,
    last_message: Option<Frame>,
    last_event_id: Option<String>,
    history: History<Frame>,
    started: bool,
    destroyed: bool,
}

impl State {
    fn is_current(&self, id: GenerationId) -> bool {
        !self.destroyed && self.generation.as_ref().is_some_and(|g| g.id == id)
    }

    fn status(&self) -> Status {
        match &self.generation {
            Some(generation) => generation.link.status(),
            None if self.destroyed || self.started => Status::Closed,
            None => Status::Pending,
        }
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.token.cancel();
            trace!(ticket = timer.ticket, "Retry timer cancelled");
        }
    }

    fn teardown(&mut self) {
        if let Some(generation) = self.generation.take() {
            generation.teardown();
        }
    }
}

struct Shared<T: Transport> {
    transport: T,
    state: Mutex<State>,
    status: watch::Sender<Status>,
    events: broadcast::Sender<SessionEvent>,
    handlers: HandlerRegistry,
    decoder: Decoder,
    retry: RetryPolicy,
    heartbeat: Option<Heartbeat>,
    manual: bool,
    generations: IdSequence,
    tickets: IdSequence,
}

// ============================================================================
// Session
// ============================================================================

/// Reconnecting connection over a [`Transport`].
///
/// Cloning a session yields another handle to the same connection. When the
/// last handle is dropped the session is torn down as by
/// [`destroy`](Self::destroy).
///
/// Methods that connect spawn tasks and must be called from within a Tokio
/// runtime.
pub struct Session<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

// ============================================================================
// Session - Construction
// ============================================================================

impl<T: Transport> Session<T> {
    /// Creates a builder for a session over `transport`.
    #[inline]
    #[must_use]
    pub fn builder(transport: T) -> SessionBuilder<T> {
        SessionBuilder::new(transport)
    }

    /// Creates an unconnected session. Called by the builder after validation.
    pub(crate) fn new(transport: T, endpoint: Option<Url>, options: SessionOptions) -> Self {
        let kind = <T::Kind as Kind>::KIND;
        let heartbeat = match options.heartbeat {
            Some(heartbeat) if kind == TransportKind::WebSocket => Some(heartbeat),
            Some(_) => {
                debug!(?kind, "Heartbeat ignored for transport without upstream frames");
                None
            }
            None => None,
        };

        let (status, _) = watch::channel(Status::Pending);
        let (events, _) = broadcast::channel(options.event_capacity);

        let state = State {
            endpoint,
            transport: options.transport,
            generation: None,
            retry_timer: None,
            retry_count: 0,
            last_error: None,
            last_message: None,
            last_event_id: None,
            history: History::new(options.max_history),
            started: false,
            destroyed: false,
        };

        Self {
            shared: Arc::new(Shared {
                transport,
                state: Mutex::new(state),
                status,
                events,
                handlers: HandlerRegistry::new(),
                decoder: Decoder::new(options.decode, options.discriminator_key),
                retry: options.retry,
                heartbeat,
                manual: options.manual,
                generations: IdSequence::default(),
                tickets: IdSequence::default(),
            }),
        }
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl<T: Transport> Session<T> {
    /// Connects to the configured endpoint.
    ///
    /// Any current connection is torn down first.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no endpoint is configured
    /// - [`Error::Destroyed`] if the session was destroyed
    pub fn connect(&self) -> Result<()> {
        self.shared.connect(None, None)
    }

    /// Connects to a new endpoint, which becomes the configured one.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if `endpoint` is not a URL
    /// - [`Error::Destroyed`] if the session was destroyed
    pub fn connect_to(&self, endpoint: &str) -> Result<()> {
        self.shared.connect(Some(parse_endpoint(endpoint)?), None)
    }

    /// Connects with an optional new endpoint and transport options.
    ///
    /// Values that are `None` keep their current setting.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect) and [`connect_to`](Self::connect_to).
    pub fn connect_with(
        &self,
        endpoint: Option<&str>,
        options: Option<TransportOptions>,
    ) -> Result<()> {
        let endpoint = endpoint.map(parse_endpoint).transpose()?;
        self.shared.connect(endpoint, options)
    }

    /// Requests a graceful close.
    ///
    /// An open link is asked to close. A link that never opened is dropped.
    /// Any pending reconnect is cancelled.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Closes and connects again with the last endpoint and options.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub fn reconnect(&self) -> Result<()> {
        self.shared.close();
        self.shared.connect(None, None)
    }

    /// Tears the session down for good.
    ///
    /// Closes the link, detaches its listeners, cancels any pending reconnect
    /// and removes every handler. Safe to call repeatedly.
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    /// Changes the endpoint.
    ///
    /// Unless the session is manual, a different endpoint triggers a
    /// reconnect. Setting the current endpoint again does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if `endpoint` is not a URL
    /// - [`Error::Destroyed`] if the session was destroyed
    pub fn set_endpoint(&self, endpoint: &str) -> Result<()> {
        self.shared.set_endpoint(parse_endpoint(endpoint)?)
    }
}

// ============================================================================
// Session - Handlers
// ============================================================================

impl<T: Transport> Session<T> {
    /// Registers a handler for a message type.
    ///
    /// Handlers run in registration order with the full decoded payload.
    pub fn register_handler<F>(&self, kind: impl Into<String>, handler: F) -> Registration
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.handlers.register(kind, Arc::new(handler))
    }

    /// Registers a handler that receives payloads deserialized into `M`.
    pub fn register_typed<M, F>(&self, kind: impl Into<String>, handler: F) -> Registration
    where
        M: DeserializeOwned,
        F: Fn(M) + Send + Sync + 'static,
    {
        self.shared.handlers.register_typed(kind, handler)
    }

    /// Registers a handler for a closed set of message types, usually a
    /// serde enum tagged by the discriminator key.
    pub fn register_any<M, F>(&self, handler: F) -> Registration
    where
        M: DeserializeOwned,
        F: Fn(M) + Send + Sync + 'static,
    {
        self.shared.handlers.register_any(handler)
    }

    /// Returns the handler registry.
    #[inline]
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.shared.handlers
    }
}

// ============================================================================
// Session - Observers
// ============================================================================

impl<T: Transport> Session<T> {
    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.state.lock().status()
    }

    /// Returns a receiver that tracks status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.shared.status.subscribe()
    }

    /// Subscribes to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Returns the transport kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        <T::Kind as Kind>::KIND
    }

    /// Returns the transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> Option<Url> {
        self.shared.state.lock().endpoint.clone()
    }

    /// Returns the last connection error, cleared on open.
    #[must_use]
    pub fn last_error(&self) -> Option<TransportError> {
        self.shared.state.lock().last_error.clone()
    }

    /// Returns the most recent frame.
    #[must_use]
    pub fn last_message(&self) -> Option<Frame> {
        self.shared.state.lock().last_message.clone()
    }

    /// Returns the retained frames, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Frame> {
        self.shared.state.lock().history.to_vec()
    }

    /// Returns the number of reconnect attempts since the last open.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.state.lock().retry_count
    }

    /// Returns the last event ID received on an event stream.
    #[must_use]
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.state.lock().last_event_id.clone()
    }

    /// Returns `true` if a reconnect is scheduled.
    #[must_use]
    pub fn is_retry_pending(&self) -> bool {
        self.shared.state.lock().retry_timer.is_some()
    }

    /// Returns `true` once [`destroy`](Self::destroy) was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }

    /// Returns `true` for manual sessions.
    #[inline]
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.shared.manual
    }
}

// ============================================================================
// Session - Sending (WebSocket only)
// ============================================================================

impl<T: Transport<Kind = WebSocketKind>> Session<T> {
    /// Sends a text frame as-is.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no link is open
    /// - [`Error::Destroyed`] if the session was destroyed
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.shared.send(Frame::Text(text.into()))
    }

    /// Serializes `value` to JSON and sends it as a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if serialization fails
    /// - [`Error::NotConnected`] if no link is open
    /// - [`Error::Destroyed`] if the session was destroyed
    pub fn send_json<S: Serialize + ?Sized>(&self, value: &S) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.shared.send(Frame::Text(text))
    }

    /// Sends a binary frame.
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Self::send_text).
    pub fn send_binary(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.shared.send(Frame::Binary(bytes.into()))
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Session")
            .field("kind", &<T::Kind as Kind>::KIND)
            .field("status", &state.status())
            .field("endpoint", &state.endpoint.as_ref().map(Url::as_str))
            .field("retry_count", &state.retry_count)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

// ============================================================================
// Shared - Lifecycle
// ============================================================================

impl<T: Transport> Shared<T> {
    fn connect(
        self: &Arc<Self>,
        endpoint: Option<Url>,
        options: Option<TransportOptions>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(Error::Destroyed);
        }
        if let Some(endpoint) = endpoint {
            state.endpoint = Some(endpoint);
        }
        if let Some(options) = options {
            state.transport = options;
        }
        self.open_generation(&mut state)
    }

    /// Replaces the current generation with a fresh one.
    fn open_generation(self: &Arc<Self>, state: &mut State) -> Result<()> {
        let Some(endpoint) = state.endpoint.clone() else {
            return Err(Error::config(
                "endpoint not defined. Set one with .endpoint() or connect_to().",
            ));
        };

        state.cancel_retry();
        state.teardown();

        let id = GenerationId::new(self.generations.next());
        let request = OpenRequest {
            endpoint,
            options: state.transport.clone(),
            last_event_id: state.last_event_id.clone(),
        };
        debug!(generation = %id, endpoint = %request.endpoint, "Connecting");

        let (link, events) = self.transport.open(request).into_parts();
        let token = CancellationToken::new();

        tokio::spawn(pump(
            Arc::downgrade(self),
            id,
            events,
            token.clone(),
            self.heartbeat.clone(),
        ));

        state.generation = Some(Generation { id, link, token });
        state.started = true;
        self.publish(state);
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.cancel_retry();

        let open = state.generation.as_ref().is_some_and(|g| g.link.is_open());
        if open && <T::Kind as Kind>::KIND.has_close_event() {
            if let Some(generation) = &state.generation {
                generation.link.close();
                debug!(generation = %generation.id, "Close requested");
            }
        } else {
            state.teardown();
        }

        self.publish(&state);
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        let first = !state.destroyed;
        state.destroyed = true;
        state.cancel_retry();
        state.teardown();
        self.publish(&state);
        drop(state);

        if first {
            self.handlers.clear();
            info!("Session destroyed");
        }
    }

    fn set_endpoint(self: &Arc<Self>, endpoint: Url) -> Result<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(Error::Destroyed);
        }
        if state.endpoint.as_ref() == Some(&endpoint) {
            trace!(endpoint = %endpoint, "Endpoint unchanged");
            return Ok(());
        }

        debug!(endpoint = %endpoint, "Endpoint changed");
        state.endpoint = Some(endpoint);

        if self.manual {
            return Ok(());
        }
        self.open_generation(&mut state)
    }

    fn send(&self, frame: Frame) -> Result<()> {
        let state = self.state.lock();
        if state.destroyed {
            return Err(Error::Destroyed);
        }
        let generation = state.generation.as_ref().ok_or(Error::NotConnected)?;
        generation.link.send(frame)
    }

    fn publish(&self, state: &State) {
        let status = state.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

// ============================================================================
// Shared - Link Events
// ============================================================================

impl<T: Transport> Shared<T> {
    fn on_open(&self, id: GenerationId) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_current(id) {
                return false;
            }
            state.last_error = None;
            state.last_message = None;
            state.retry_count = 0;
            self.publish(&state);
        }

        info!(generation = %id, "Connection open");
        self.notify(SessionEvent::Open);
        true
    }

    fn on_message(self: &Arc<Self>, id: GenerationId, frame: Frame) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_current(id) {
                return false;
            }
            if let Frame::Event(event) = &frame
                && let Some(event_id) = &event.id
            {
                state.last_event_id = (!event_id.is_empty()).then(|| event_id.clone());
            }
            state.last_message = Some(frame.clone());
            state.history.push(frame.clone());
            self.publish(&state);
        }

        trace!(generation = %id, len = frame.len(), "Frame received");

        if self.decoder.mode().is_async() {
            self.decode_in_background(frame.clone());
        } else if let Some(envelope) = self.decoder.decode(&frame) {
            self.handlers.dispatch(&envelope);
        }

        self.notify(SessionEvent::Message(frame));
        true
    }

    /// Decodes on a separate task so later frames are not held up.
    fn decode_in_background(self: &Arc<Self>, frame: Frame) {
        let decoder = self.decoder.clone();
        let shared = Arc::downgrade(self);

        tokio::spawn(async move {
            let envelope = decoder.decode_async(frame).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if shared.state.lock().destroyed {
                trace!("Dropping decoded frame for destroyed session");
                return;
            }
            if let Some(envelope) = envelope {
                shared.handlers.dispatch(&envelope);
            }
        });
    }

    fn on_close(&self, id: GenerationId, info: Option<CloseInfo>) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_current(id) {
                return false;
            }
            state.teardown();
            state.last_error = None;
            state.last_message = None;
            self.publish(&state);
        }

        info!(
            generation = %id,
            code = info.as_ref().map(|i| i.code),
            "Connection closed"
        );
        self.notify(SessionEvent::Close(info));
        true
    }

    fn on_error(self: &Arc<Self>, id: GenerationId, error: TransportError) -> bool {
        let mut state = self.state.lock();
        if !state.is_current(id) {
            return false;
        }
        state.teardown();
        self.fail(state, error);
        true
    }

    /// Fails the generation when no pong arrived in time.
    fn on_heartbeat_expired(self: &Arc<Self>, id: GenerationId, timeout_ms: u64) {
        let mut state = self.state.lock();
        let open = state.generation.as_ref().is_some_and(|g| g.link.is_open());
        if !state.is_current(id) || !open {
            return;
        }
        state.teardown();
        self.fail(state, TransportError::heartbeat(timeout_ms));
    }

    fn ping(&self, id: GenerationId, message: &str) -> bool {
        let state = self.state.lock();
        if !state.is_current(id) {
            return false;
        }
        let Some(generation) = &state.generation else {
            return false;
        };
        match generation.link.send(Frame::from(message)) {
            Ok(()) => true,
            Err(e) => {
                trace!(generation = %id, error = %e, "Heartbeat skipped");
                false
            }
        }
    }

    /// Records a failure and applies the retry policy.
    ///
    /// Takes the lock guard so the decision and the timer are installed
    /// atomically with the failure.
    fn fail(self: &Arc<Self>, mut state: MutexGuard<'_, State>, error: TransportError) {
        state.last_error = Some(error.clone());
        self.publish(&state);

        let decision = self.retry.decide(state.retry_count);
        if decision == RetryDecision::Retry {
            state.retry_count += 1;
            self.schedule_retry(&mut state);
        }
        let attempts = state.retry_count;
        drop(state);

        warn!(error = %error, retry_count = attempts, ?decision, "Connection failed");
        self.notify(SessionEvent::Error(error));

        if decision == RetryDecision::Exhausted {
            info!(max_retries = self.retry.max_retries(), "Retries exhausted");
            self.retry.notify_exhausted();
            self.state.lock().retry_count = 0;
        }
    }

    fn schedule_retry(self: &Arc<Self>, state: &mut State) {
        state.cancel_retry();

        let ticket = self.tickets.next();
        let token = CancellationToken::new();
        let delay = self.retry.delay();
        let shared = Arc::downgrade(self);

        state.retry_timer = Some(RetryTimer {
            ticket,
            token: token.clone(),
        });
        debug!(
            ticket,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = state.retry_count,
            "Reconnect scheduled"
        );

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep(delay) => {
                    if let Some(shared) = shared.upgrade() {
                        shared.fire_retry(ticket);
                    }
                }
            }
        });
    }

    fn fire_retry(self: &Arc<Self>, ticket: u64) {
        let mut state = self.state.lock();
        let due = state.retry_timer.as_ref().is_some_and(|t| t.ticket == ticket);
        if !due || state.destroyed {
            return;
        }
        state.retry_timer = None;

        if let Err(e) = self.open_generation(&mut state) {
            warn!(error = %e, "Reconnect failed");
        }
    }
}

impl<T: Transport> Drop for Shared<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_retry();
        state.teardown();
        if state.started && !state.destroyed {
            debug!("Session dropped");
        }
    }
}

// ============================================================================
// Event Pump
// ============================================================================

/// Forwards one generation's link events to the session until cancelled.
async fn pump<T: Transport>(
    shared: Weak<Shared<T>>,
    id: GenerationId,
    mut events: LinkEvents,
    token: CancellationToken,
    heartbeat: Option<Heartbeat>,
) {
    let pong_timeout = heartbeat.as_ref().and_then(|h| h.pong_timeout);
    let mut ticker: Option<Interval> = None;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let event = tokio::select! {
            biased;

            () = token.cancelled() => break,

            () = expiry(pong_deadline) => {
                let timeout_ms = pong_timeout
                    .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
                if let Some(shared) = shared.upgrade() {
                    shared.on_heartbeat_expired(id, timeout_ms);
                }
                break;
            }

            () = next_tick(&mut ticker) => {
                let (Some(heartbeat), Some(shared)) = (&heartbeat, shared.upgrade()) else {
                    break;
                };
                if shared.ping(id, &heartbeat.message)
                    && pong_deadline.is_none()
                    && let Some(timeout) = pong_timeout
                {
                    pong_deadline = Some(Instant::now() + timeout);
                }
                continue;
            }

            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(shared) = shared.upgrade() else {
            break;
        };

        let current = match event {
            LinkEvent::Open => {
                if let Some(heartbeat) = &heartbeat {
                    ticker = Some(heartbeat_interval(heartbeat));
                }
                shared.on_open(id)
            }
            LinkEvent::Message(frame) => {
                if let Some(heartbeat) = &heartbeat {
                    pong_deadline = None;
                    if frame.is_text() && frame.as_text() == Some(heartbeat.pong()) {
                        trace!(generation = %id, "Pong received");
                        continue;
                    }
                }
                shared.on_message(id, frame)
            }
            LinkEvent::Close(info) => {
                shared.on_close(id, info);
                break;
            }
            LinkEvent::Error(error) => {
                shared.on_error(id, error);
                break;
            }
        };

        if !current {
            break;
        }
    }

    trace!(generation = %id, "Event pump stopped");
}

fn heartbeat_interval(heartbeat: &Heartbeat) -> Interval {
    let mut interval = interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses an endpoint string.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| Error::invalid_endpoint(endpoint, e))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("ws://localhost:8080/feed").is_ok());
        let err = parse_endpoint("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_new_session_is_pending() {
        let session = Session::new(MemoryTransport::websocket(), None, SessionOptions::new());
        assert_eq!(session.status(), Status::Pending);
        assert_eq!(*session.watch_status().borrow(), Status::Pending);
        assert_eq!(session.kind(), TransportKind::WebSocket);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_connect_without_endpoint_is_config_error() {
        let session = Session::new(MemoryTransport::websocket(), None, SessionOptions::new());
        let err = session.connect().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("endpoint not defined"));
        assert_eq!(session.status(), Status::Pending);
    }

    #[test]
    fn test_destroy_without_connection() {
        let session = Session::new(MemoryTransport::websocket(), None, SessionOptions::new());
        session.destroy();
        session.destroy();
        assert_eq!(session.status(), Status::Closed);
        assert!(matches!(session.connect(), Err(Error::Destroyed)));
    }

    #[test]
    fn test_send_without_connection() {
        let session = Session::new(MemoryTransport::websocket(), None, SessionOptions::new());
        assert!(matches!(session.send_text("hi"), Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_opens_link() {
        let transport = MemoryTransport::websocket();
        let endpoint = parse_endpoint("ws://example.test/feed").ok();
        let session = Session::new(transport.clone(), endpoint, SessionOptions::new());

        session.connect().expect("connect should succeed");
        assert_eq!(session.status(), Status::Connecting);
        assert_eq!(transport.open_count(), 1);
    }

    #[test]
    fn test_heartbeat_ignored_for_event_source() {
        let options = SessionOptions::new().with_heartbeat(Heartbeat::new());
        let session = Session::new(MemoryTransport::event_source(), None, options);
        assert!(session.shared.heartbeat.is_none());
    }
}
